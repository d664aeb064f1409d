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

    cpu_386::modrm.rs

    Resolves 32-bit ModR/M addressing, including SIB bytes and displacements.

*/

//! Reading a ModR/M byte resolves to a static reference into a const table of [ModRmByte],
//! classified ahead of time by mod and r/m fields. Any SIB byte and displacement are then read
//! from the instruction stream and combined through the register-transfer layer.

use modular_bitfield::prelude::*;

use crate::{
    bytereader::ByteReader,
    cpu_386::ScratchPool,
    cpu_common::{DecodeError, Operand, OperandKind, R_EBP, R_ESP},
    rtl::Rtl,
};

pub const MODRM_REG_MASK: u8 = 0b00_111_000;
pub const MODRM_ADDR_MASK: u8 = 0b11_000_111;

const MODRM_ADDR_SIB: u8 = 0b00_000_100;
const MODRM_ADDR_DISP32: u8 = 0b00_000_101;

const SIB_NO_INDEX: u8 = R_ESP;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Displacement {
    NoDisp,
    Pending8,
    Pending32,
    Disp8(i8),
    Disp32(i32),
}

impl Displacement {
    /// Return the displacement sign-extended to 32 bits.
    pub fn get_u32(&self) -> u32 {
        match self {
            Displacement::Disp8(disp) => *disp as i32 as u32,
            Displacement::Disp32(disp) => *disp as u32,
            _ => 0,
        }
    }
}

#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct SibByte {
    pub base: B3,
    pub index: B3,
    pub scale: B2,
}

#[derive(Copy, Clone, Debug)]
pub struct ModRmByte {
    byte: u8,
    b_mod: u8,
    b_reg: u8,
    b_rm: u8,
    disp: Displacement,
    has_sib: bool,
    has_base: bool,
}

const MODRM_TABLE: [ModRmByte; 256] = {
    let mut table: [ModRmByte; 256] = [ModRmByte {
        byte: 0,
        b_mod: 0,
        b_reg: 0,
        b_rm: 0,
        disp: Displacement::NoDisp,
        has_sib: false,
        has_base: false,
    }; 256];
    let mut byte: usize = 0;

    while byte < 256 {
        let b = byte as u8;
        let b_mod = (b >> 6) & 0x03;
        let b_reg = (b & MODRM_REG_MASK) >> 3;
        let b_rm = b & 0x07;

        let disp = match b_mod {
            // [disp32] replaces [ebp] when mod is 0b00
            0b00 if b & MODRM_ADDR_MASK == MODRM_ADDR_DISP32 => Displacement::Pending32,
            0b01 => Displacement::Pending8,
            0b10 => Displacement::Pending32,
            _ => Displacement::NoDisp,
        };

        let is_memory = b_mod != 0b11;
        let has_sib = is_memory && b_rm == MODRM_ADDR_SIB;
        let has_base = is_memory && !has_sib && (b & MODRM_ADDR_MASK != MODRM_ADDR_DISP32);

        table[byte] = ModRmByte {
            byte: b,
            b_mod,
            b_reg,
            b_rm,
            disp,
            has_sib,
            has_base,
        };
        byte += 1;
    }

    table
};

impl ModRmByte {
    /// Read the ModR/M byte at the cursor and return its table entry. Any SIB byte or displacement
    /// is left unread.
    pub fn read(bytes: &mut impl ByteReader) -> Result<&'static ModRmByte, DecodeError> {
        let byte = bytes.read_u8()?;
        Ok(&MODRM_TABLE[byte as usize])
    }

    /// Return the table entry for the ModR/M byte at the cursor without consuming it.
    pub fn peek(bytes: &mut impl ByteReader) -> Result<&'static ModRmByte, DecodeError> {
        let byte = bytes.peek_u8()?;
        Ok(&MODRM_TABLE[byte as usize])
    }

    /// Resolve a ModR/M encoding into an r/m operand and, optionally, a reg-field operand.
    ///
    /// Both operands must already carry their widths. Consumes the ModR/M byte plus any SIB byte
    /// and displacement. A memory r/m operand has its effective address staged into `addr`; the
    /// value loads are emitted only when requested.
    pub fn resolve(
        bytes: &mut impl ByteReader,
        rtl: &mut impl Rtl,
        scratch: &mut ScratchPool,
        rm: &mut Operand,
        load_rm: bool,
        reg: Option<&mut Operand>,
        load_reg: bool,
    ) -> Result<&'static ModRmByte, DecodeError> {
        let modrm = ModRmByte::read(bytes)?;

        if let Some(reg) = reg {
            reg.kind = OperandKind::Register;
            reg.reg = modrm.b_reg;
            if load_reg {
                rtl.lr(&mut reg.val, reg.reg, reg.width);
            }
        }

        if modrm.is_addressing_mode() {
            let ea = modrm.effective_address(bytes, rtl, scratch)?;
            rm.kind = OperandKind::Memory;
            rtl.li(&mut rm.addr, ea);
            if load_rm {
                rtl.lm(&mut rm.val, rm.addr, rm.width);
            }
        }
        else {
            rm.kind = OperandKind::Register;
            rm.reg = modrm.b_rm;
            if load_rm {
                rtl.lr(&mut rm.val, rm.reg, rm.width);
            }
        }

        Ok(modrm)
    }

    /// Compute base + (index << scale) + displacement, reading register values into the scratch
    /// pool. Address arithmetic wraps at 32 bits.
    fn effective_address(
        &self,
        bytes: &mut impl ByteReader,
        rtl: &mut impl Rtl,
        scratch: &mut ScratchPool,
    ) -> Result<u32, DecodeError> {
        let mut ea: u32 = 0;

        if self.has_sib {
            let sib = SibByte::from_bytes([bytes.read_u8()?]);

            if sib.index() != SIB_NO_INDEX {
                rtl.lr(&mut scratch.at, sib.index(), 4);
                ea = scratch.at << sib.scale();
            }

            if sib.base() == R_EBP && self.b_mod == 0b00 {
                ea = ea.wrapping_add(bytes.read_u32()?);
            }
            else {
                rtl.lr(&mut scratch.at, sib.base(), 4);
                ea = ea.wrapping_add(scratch.at);
            }
        }
        else if self.has_base {
            rtl.lr(&mut scratch.at, self.b_rm, 4);
            ea = scratch.at;
        }

        let disp = self.read_displacement(bytes)?;
        Ok(ea.wrapping_add(disp.get_u32()))
    }

    /// Read any displacement this ModR/M byte calls for.
    pub fn read_displacement(&self, bytes: &mut impl ByteReader) -> Result<Displacement, DecodeError> {
        match self.disp {
            Displacement::Pending8 => Ok(Displacement::Disp8(bytes.read_u8()? as i8)),
            Displacement::Pending32 => Ok(Displacement::Disp32(bytes.read_u32()? as i32)),
            _ => Ok(Displacement::NoDisp),
        }
    }

    #[inline(always)]
    pub fn byte(&self) -> u8 {
        self.byte
    }
    // Interpret the 'REG' field as a 3 bit opcode extension
    #[inline(always)]
    pub fn op_extension(&self) -> u8 {
        self.b_reg
    }
    #[inline(always)]
    pub fn reg(&self) -> u8 {
        self.b_reg
    }
    #[inline(always)]
    pub fn rm(&self) -> u8 {
        self.b_rm
    }
    // Return whether the modrm byte specifies a memory addressing mode
    #[inline(always)]
    pub fn is_addressing_mode(&self) -> bool {
        self.b_mod != 0b11
    }
}
