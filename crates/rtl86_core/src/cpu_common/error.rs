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

    cpu_common::error.rs

    This module defines the error type returned by the instruction decoder.

*/

use thiserror::Error;

/// Errors that terminate decoding of the current instruction. None of these are recoverable by
/// retrying; the caller should treat them as an illegal instruction fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of instruction stream reading address: {0:08X}")]
    ReadOutOfBounds(u32),
    #[error("Invalid ModR/M byte {0:02X} at address: {1:08X}")]
    InvalidModRm(u8, u32),
    #[error("An unsupported opcode was encountered: {0:04X} at address: {1:08X}")]
    UnsupportedOpcode(u16, u32),
    #[error("Instruction exceeds the maximum length of 15 bytes at address: {0:08X}")]
    InstructionTooLong(u32),
}

impl DecodeError {
    /// Return the address at which decoding failed.
    pub fn address(&self) -> u32 {
        match *self {
            DecodeError::ReadOutOfBounds(addr) => addr,
            DecodeError::InvalidModRm(_, addr) => addr,
            DecodeError::UnsupportedOpcode(_, addr) => addr,
            DecodeError::InstructionTooLong(addr) => addr,
        }
    }
}
