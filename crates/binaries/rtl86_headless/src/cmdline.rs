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

    rtl86_headless::cmdline.rs

    Command line arguments for the headless frontend.

*/

use std::path::PathBuf;

use bpaf::Bpaf;

#[derive(Bpaf, Debug, Default)]
#[bpaf(options, version, generate(cli_args))]
pub struct CmdLineArgs {
    #[bpaf(long("config_file"), long("configfile"))]
    pub config_file: Option<PathBuf>,

    /// Instruction bytes as hex, e.g. "05 01 00 00 00"
    #[bpaf(long)]
    pub hex: Option<String>,

    /// Raw binary image to decode
    #[bpaf(long)]
    pub bin: Option<PathBuf>,

    /// Address to map the image at (decimal or 0x-prefixed hex)
    #[bpaf(long("load_address"))]
    pub load_address: Option<String>,

    /// Default operand size: 16 or 32
    #[bpaf(long("operand_size"))]
    pub operand_size: Option<u32>,

    /// Print the micro-operations emitted while decoding each instruction
    #[bpaf(long, switch)]
    pub trace: bool,

    /// Stop after this many instructions
    #[bpaf(long)]
    pub count: Option<usize>,
}
