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

    cpu_common::mod.rs

    Register and operand size definitions shared by the decoder and the
    register-transfer layer.

*/

pub mod error;
pub mod mnemonic;
pub mod operands;

pub use error::DecodeError;
pub use mnemonic::Mnemonic;
pub use operands::{Operand, OperandKind};

use serde_derive::Deserialize;
use strum_macros::{Display, IntoStaticStr};

// Instruction prefixes
pub const OPCODE_PREFIX_ES_OVERRIDE: u32 = 0b_0000_0000_0001;
pub const OPCODE_PREFIX_CS_OVERRIDE: u32 = 0b_0000_0000_0010;
pub const OPCODE_PREFIX_SS_OVERRIDE: u32 = 0b_0000_0000_0100;
pub const OPCODE_PREFIX_DS_OVERRIDE: u32 = 0b_0000_0000_1000;
pub const OPCODE_PREFIX_FS_OVERRIDE: u32 = 0b_0000_0001_0000;
pub const OPCODE_PREFIX_GS_OVERRIDE: u32 = 0b_0000_0010_0000;
pub const OPCODE_PREFIX_OPERAND_SIZE: u32 = 0b_0000_0100_0000;
pub const OPCODE_PREFIX_LOCK: u32 = 0b_0000_1000_0000;
pub const OPCODE_PREFIX_REPNE: u32 = 0b_0001_0000_0000;
pub const OPCODE_PREFIX_REP: u32 = 0b_0010_0000_0000;
pub const OPCODE_PREFIX_0F: u32 = 0b_1000_0000_0000;

// General purpose register indices, as encoded in ModR/M fields and opcode bytes.
pub const R_EAX: u8 = 0;
pub const R_ECX: u8 = 1;
pub const R_EDX: u8 = 2;
pub const R_EBX: u8 = 3;
pub const R_ESP: u8 = 4;
pub const R_EBP: u8 = 5;
pub const R_ESI: u8 = 6;
pub const R_EDI: u8 = 7;

pub const R_AX: u8 = 0;
pub const R_DX: u8 = 2;

pub const R_AL: u8 = 0;
pub const R_CL: u8 = 1;
pub const R_DL: u8 = 2;
pub const R_BL: u8 = 3;
pub const R_AH: u8 = 4;
pub const R_CH: u8 = 5;
pub const R_DH: u8 = 6;
pub const R_BH: u8 = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Register8 {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Register16 {
    AX,
    CX,
    DX,
    BX,
    SP,
    BP,
    SI,
    DI,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Register32 {
    EAX,
    ECX,
    EDX,
    EBX,
    ESP,
    EBP,
    ESI,
    EDI,
}

pub const REGISTER8_LUT: [Register8; 8] = [
    Register8::AL,
    Register8::CL,
    Register8::DL,
    Register8::BL,
    Register8::AH,
    Register8::CH,
    Register8::DH,
    Register8::BH,
];

pub const REGISTER16_LUT: [Register16; 8] = [
    Register16::AX,
    Register16::CX,
    Register16::DX,
    Register16::BX,
    Register16::SP,
    Register16::BP,
    Register16::SI,
    Register16::DI,
];

pub const REGISTER32_LUT: [Register32; 8] = [
    Register32::EAX,
    Register32::ECX,
    Register32::EDX,
    Register32::EBX,
    Register32::ESP,
    Register32::EBP,
    Register32::ESI,
    Register32::EDI,
];

/// Return the name of the register selected by `index` at the given operand width in bytes.
pub fn reg_name(index: u8, width: u8) -> &'static str {
    let index = (index & 0x07) as usize;
    match width {
        1 => REGISTER8_LUT[index].into(),
        2 => REGISTER16_LUT[index].into(),
        4 => REGISTER32_LUT[index].into(),
        _ => panic!("Invalid register width: {}", width),
    }
}

/// The operand-size attribute in effect for width-polymorphic ('v') encodings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u32")]
pub enum OperandSize {
    Operand16,
    #[default]
    Operand32,
}

impl OperandSize {
    /// Width of a 'v' operand in bytes.
    #[inline(always)]
    pub fn bytes(&self) -> u8 {
        match self {
            OperandSize::Operand16 => 2,
            OperandSize::Operand32 => 4,
        }
    }

    /// The operand size selected after an operand-size override prefix.
    #[inline]
    pub fn toggled(&self) -> OperandSize {
        match self {
            OperandSize::Operand16 => OperandSize::Operand32,
            OperandSize::Operand32 => OperandSize::Operand16,
        }
    }
}

impl TryFrom<u32> for OperandSize {
    type Error = String;
    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            16 => Ok(OperandSize::Operand16),
            32 => Ok(OperandSize::Operand32),
            _ => Err(format!("Bad value for operand size: {} (expected 16 or 32)", bits)),
        }
    }
}

/// Mask covering an operand of `width` bytes.
#[inline(always)]
pub fn width_mask(width: u8) -> u32 {
    match width {
        1 => 0xFF,
        2 => 0xFFFF,
        4 => 0xFFFF_FFFF,
        _ => panic!("Invalid operand width: {}", width),
    }
}
