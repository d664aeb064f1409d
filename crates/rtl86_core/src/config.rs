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

    config.rs

    Definition of the CoreConfig trait which provides an interface for the
    decoder to retrieve options from a configuration store, and the TOML
    configuration file format implementing it.

*/

use std::path::Path;

use anyhow::{Context, Result};
use serde_derive::Deserialize;

use crate::cpu_common::OperandSize;

const fn _default_memory_size() -> usize {
    0x10_0000
}
const fn _default_load_address() -> u32 {
    0x1000
}

pub trait CoreConfig {
    fn get_operand_size(&self) -> OperandSize;
    fn get_trace_micro_ops(&self) -> bool;
    fn get_memory_size(&self) -> usize;
    fn get_load_address(&self) -> u32;
}

#[derive(Debug, Default, Deserialize)]
pub struct DecodeOptions {
    #[serde(default)]
    pub operand_size: OperandSize,
    #[serde(default)]
    pub trace_micro_ops: bool,
}

#[derive(Debug, Deserialize)]
pub struct Machine {
    #[serde(default = "_default_memory_size")]
    pub memory_size: usize,
    #[serde(default = "_default_load_address")]
    pub load_address: u32,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            memory_size:  _default_memory_size(),
            load_address: _default_load_address(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFileParams {
    #[serde(default)]
    pub decoder: DecodeOptions,
    #[serde(default)]
    pub machine: Machine,
}

impl ConfigFileParams {
    pub fn from_toml_str(toml_text: &str) -> Result<Self> {
        let params: ConfigFileParams = toml::from_str(toml_text)?;
        Ok(params)
    }
}

impl CoreConfig for ConfigFileParams {
    fn get_operand_size(&self) -> OperandSize {
        self.decoder.operand_size
    }
    fn get_trace_micro_ops(&self) -> bool {
        self.decoder.trace_micro_ops
    }
    fn get_memory_size(&self) -> usize {
        self.machine.memory_size
    }
    fn get_load_address(&self) -> u32 {
        self.machine.load_address
    }
}

pub fn read_config_file<P: AsRef<Path>>(path: P) -> Result<ConfigFileParams> {
    let path = path.as_ref();
    let toml_text =
        std::fs::read_to_string(path).with_context(|| format!("Reading configuration file '{}'", path.display()))?;
    ConfigFileParams::from_toml_str(&toml_text)
        .with_context(|| format!("Parsing configuration file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let params = ConfigFileParams::from_toml_str(
            r#"
            [decoder]
            operand_size = 16
            trace_micro_ops = true

            [machine]
            memory_size = 65536
            load_address = 256
            "#,
        )
        .unwrap();

        assert_eq!(params.get_operand_size(), OperandSize::Operand16);
        assert!(params.get_trace_micro_ops());
        assert_eq!(params.get_memory_size(), 0x10000);
        assert_eq!(params.get_load_address(), 0x100);
    }

    #[test]
    fn test_parse_defaults() {
        let params = ConfigFileParams::from_toml_str("").unwrap();
        assert_eq!(params.get_operand_size(), OperandSize::Operand32);
        assert!(!params.get_trace_micro_ops());
        assert_eq!(params.get_memory_size(), 0x10_0000);
        assert_eq!(params.get_load_address(), 0x1000);

        let params = ConfigFileParams::from_toml_str("[machine]\nload_address = 4096\n").unwrap();
        assert_eq!(params.get_memory_size(), 0x10_0000);
    }

    #[test]
    fn test_parse_bad_operand_size() {
        let result = ConfigFileParams::from_toml_str("[decoder]\noperand_size = 8\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = read_config_file("/nonexistent/rtl86.toml").unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
