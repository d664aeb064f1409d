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

    cpu_common::operands.rs

    This module defines the decoded operand descriptor.

*/

use std::fmt;

use crate::{cpu_common::reg_name, rtl::RtlReg};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OperandKind {
    #[default]
    None,
    Register,
    Memory,
    Immediate,
}

/// A single decoded source or destination of an instruction.
///
/// Which of `reg`, `addr` or `imm` is meaningful is determined by `kind`. `val` holds the value
/// staged by the register-transfer layer when the operand was loaded during decode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Operand {
    pub kind: OperandKind,
    /// Operand width in bytes: 1, 2 or 4.
    pub width: u8,
    pub reg: u8,
    pub addr: RtlReg,
    pub val: RtlReg,
    pub imm: u32,
    pub simm: i32,
}

impl Operand {
    pub fn with_width(width: u8) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_register(&self) -> bool {
        self.kind == OperandKind::Register
    }

    #[inline]
    pub fn is_memory(&self) -> bool {
        self.kind == OperandKind::Memory
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.kind == OperandKind::Immediate
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == OperandKind::None
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperandKind::None => Ok(()),
            OperandKind::Register => write!(f, "{}", reg_name(self.reg, self.width)),
            OperandKind::Memory => {
                let ptr = match self.width {
                    1 => "byte",
                    2 => "word",
                    _ => "dword",
                };
                write!(f, "{} ptr [{:X}h]", ptr, self.addr)
            }
            // Immediates always stage their (possibly sign-extended and masked) value.
            OperandKind::Immediate => write!(f, "{:X}h", self.val),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_display() {
        let mut op = Operand::with_width(4);
        assert_eq!(op.to_string(), "");

        op.kind = OperandKind::Register;
        op.reg = 3;
        assert_eq!(op.to_string(), "ebx");
        op.width = 1;
        assert_eq!(op.to_string(), "bl");

        op.kind = OperandKind::Memory;
        op.width = 2;
        op.addr = 0x401000;
        assert_eq!(op.to_string(), "word ptr [401000h]");

        op.kind = OperandKind::Immediate;
        op.val = 0xFF80;
        assert_eq!(op.to_string(), "FF80h");
    }
}
