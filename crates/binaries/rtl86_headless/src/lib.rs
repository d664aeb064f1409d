/*
    rtl86

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    rtl86_headless::lib.rs

    Headless frontend main library component. Decodes an instruction stream
    linearly from its load address, printing a listing and, optionally, the
    register-transfer micro-operations emitted for each instruction.

*/

#![forbid(unsafe_code)]

mod cmdline;

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use rtl86_core::{
    bytereader::{ByteReader, InstructionStream},
    config::{read_config_file, ConfigFileParams, CoreConfig},
    cpu_386::Decoder,
    cpu_common::OperandSize,
    rtl::RtlCpu,
};

use crate::cmdline::{cli_args, CmdLineArgs};

const DEFAULT_CONFIG_PATH: &str = "./rtl86.toml";

pub fn run() {
    env_logger::init();

    let shell_args = cli_args().run();

    let mut config = match load_config(shell_args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => match e.downcast_ref::<std::io::Error>() {
            Some(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!("Configuration file not found: {}", e);
                std::process::exit(1);
            }
            Some(e) => {
                eprintln!("Unknown IO error reading configuration file:\n{}", e);
                std::process::exit(1);
            }
            None => {
                eprintln!(
                    "Failed to parse configuration file. There may be a typo or otherwise invalid toml:\n{:#}",
                    e
                );
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = apply_args(&mut config, &shell_args) {
        eprintln!("Invalid command line: {:#}", e);
        std::process::exit(1);
    }

    let image = match load_image(&shell_args) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Couldn't load program image: {:#}", e);
            std::process::exit(1);
        }
    };

    match decode_listing(&config, &image, shell_args.count) {
        Ok(listing) => {
            for line in listing {
                println!("{}", line);
            }
        }
        Err(e) => {
            log::error!("Decoding failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Read the configuration file named on the command line, or the default file if one exists.
fn load_config(path: Option<&Path>) -> Result<ConfigFileParams> {
    match path {
        Some(path) => read_config_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => read_config_file(DEFAULT_CONFIG_PATH),
        None => {
            log::debug!("No configuration file, using defaults");
            Ok(ConfigFileParams::default())
        }
    }
}

/// Command line options override the configuration file.
fn apply_args(config: &mut ConfigFileParams, args: &CmdLineArgs) -> Result<()> {
    if let Some(bits) = args.operand_size {
        config.decoder.operand_size = OperandSize::try_from(bits).map_err(|e| anyhow!(e))?;
    }
    if let Some(addr) = &args.load_address {
        config.machine.load_address = parse_number(addr)?;
    }
    if args.trace {
        config.decoder.trace_micro_ops = true;
    }
    Ok(())
}

fn load_image(args: &CmdLineArgs) -> Result<Vec<u8>> {
    match (&args.hex, &args.bin) {
        (Some(hex), None) => parse_hex(hex),
        (None, Some(path)) => {
            std::fs::read(path).with_context(|| format!("Reading program image '{}'", path.display()))
        }
        (Some(_), Some(_)) => bail!("--hex and --bin are mutually exclusive"),
        (None, None) => bail!("No program specified. Use --hex or --bin."),
    }
}

pub fn parse_number(text: &str) -> Result<u32> {
    let text = text.trim();
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    value.with_context(|| format!("Invalid number: '{}'", text))
}

/// Parse a string of hex byte pairs. Whitespace and commas between bytes are ignored.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits in '{}'", text);
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte: '{}'", &digits[i..i + 2]))
        })
        .collect()
}

/// Decode `image` linearly from the configured load address, returning one line per instruction
/// followed by its micro-operations when tracing is enabled.
pub fn decode_listing(config: &impl CoreConfig, image: &[u8], count: Option<usize>) -> Result<Vec<String>> {
    let load_address = config.get_load_address();
    let mut cpu = RtlCpu::new(config.get_memory_size());
    if image.len() > cpu.memory_size() {
        bail!(
            "Program image of {} bytes doesn't fit in {} bytes of memory",
            image.len(),
            cpu.memory_size()
        );
    }
    cpu.load_image(load_address, image);
    cpu.set_trace(config.get_trace_micro_ops());

    let mut decoder = Decoder::from_config(config);
    let mut stream = InstructionStream::new(image, load_address);
    let mut listing = Vec::new();
    let limit = count.unwrap_or(usize::MAX);

    let mut decoded = 0;
    while !stream.at_end() && decoded < limit {
        let address = stream.tell();
        let instruction = decoder
            .decode_instruction(&mut stream, &mut cpu)
            .with_context(|| format!("Decoding instruction at {:08X}", address))?;

        let bytes = stream
            .slice(address, instruction.next_address())
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        listing.push(format!("{:08X}  {:<24} {}", address, bytes, instruction));

        for op in cpu.take_trace() {
            listing.push(format!("          {}", op));
        }
        decoded += 1;
    }

    log::debug!("Decoded {} instructions", decoded);
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("05 01 00 00 00").unwrap(), vec![0x05, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(parse_hex("0fb6c3").unwrap(), vec![0x0F, 0xB6, 0xC3]);
        assert_eq!(parse_hex("eb,05").unwrap(), vec![0xEB, 0x05]);
        assert!(parse_hex("0f b").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096").unwrap(), 0x1000);
        assert_eq!(parse_number("0x7C00").unwrap(), 0x7C00);
        assert!(parse_number("0xZZ").is_err());
    }

    #[test]
    fn test_decode_listing() {
        let config = ConfigFileParams::default();
        let image = parse_hex("B9 05 00 00 00 49 75 FD F4").unwrap();
        let listing = decode_listing(&config, &image, None).unwrap();

        assert_eq!(listing.len(), 4);
        assert!(listing[0].starts_with("00001000  B9 05 00 00 00"));
        assert!(listing[0].ends_with("mov ecx, 5h"));
        assert!(listing[2].ends_with("jne 1005h"));
        assert!(listing[3].ends_with("hlt"));

        let listing = decode_listing(&config, &image, Some(2)).unwrap();
        assert_eq!(listing.len(), 2);
    }

    #[test]
    fn test_decode_listing_with_trace() {
        let mut config = ConfigFileParams::default();
        config.decoder.trace_micro_ops = true;
        config.machine.load_address = 0x100;

        let image = parse_hex("A1 00 01 00 00").unwrap();
        let listing = decode_listing(&config, &image, None).unwrap();
        assert_eq!(listing[0], format!("00000100  {:<24} mov eax, dword ptr [100h]", "A1 00 01 00 00"));
        assert_eq!(listing[1].trim(), "li 100h");
        assert_eq!(listing[2].trim(), "lm dword [100h]");
    }

    #[test]
    fn test_decode_listing_error() {
        let config = ConfigFileParams::default();
        let image = parse_hex("90 0F 0B").unwrap();
        let err = decode_listing(&config, &image, None).unwrap_err();
        assert!(err.to_string().contains("00001001"));
    }
}
