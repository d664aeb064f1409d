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

    cpu_386::shapes.rs

    Instruction-class decoders. Each shape composes addressing-method
    primitives in a fixed order, populating the Decoder's destination,
    source and secondary source operands.

*/

use crate::{
    bytereader::ByteReader,
    cpu_386::{addressing::*, modrm::ModRmByte, Decoder},
    cpu_common::{DecodeError, Operand, OperandKind},
    rtl::{Rtl, RtlReg},
};

/// The operand pattern of an instruction. Selected once per opcode when the decode table is
/// built; [DecodeShape::decode] runs the primitive sequence for the shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DecodeShape {
    #[default]
    None,
    G2E,
    MovG2E,
    E2G,
    MovE2G,
    LeaM2G,
    I2a,
    IE2G,
    SIE2G,
    I2E,
    MovI2E,
    SI2E,
    I2r,
    MovI2r,
    A2r,
    I,
    R,
    E,
    SetccE,
    TestI,
    J,
    PushSI,
    Gp2One,
    Gp2Cl,
    Gp2Ib,
    IbG2E,
    ClG2E,
    InI2a,
    InDx2a,
    OutA2I,
    OutA2Dx,
    O2a,
    A2O,
}

impl DecodeShape {
    pub fn decode(
        self,
        decoder: &mut Decoder,
        bytes: &mut impl ByteReader,
        rtl: &mut impl Rtl,
    ) -> Result<(), DecodeError> {
        match self {
            DecodeShape::None => Ok(()),
            DecodeShape::G2E => decoder.decode_g2e(bytes, rtl),
            DecodeShape::MovG2E => decoder.decode_mov_g2e(bytes, rtl),
            DecodeShape::E2G => decoder.decode_e2g(bytes, rtl),
            DecodeShape::MovE2G => decoder.decode_mov_e2g(bytes, rtl),
            DecodeShape::LeaM2G => decoder.decode_lea_m2g(bytes, rtl),
            DecodeShape::I2a => decoder.decode_i2a(bytes, rtl),
            DecodeShape::IE2G => decoder.decode_i_e2g(bytes, rtl),
            DecodeShape::SIE2G => decoder.decode_si_e2g(bytes, rtl),
            DecodeShape::I2E => decoder.decode_i2e(bytes, rtl),
            DecodeShape::MovI2E => decoder.decode_mov_i2e(bytes, rtl),
            DecodeShape::SI2E => decoder.decode_si2e(bytes, rtl),
            DecodeShape::I2r => decoder.decode_i2r(bytes, rtl),
            DecodeShape::MovI2r => decoder.decode_mov_i2r(bytes, rtl),
            DecodeShape::A2r => decoder.decode_a2r(bytes, rtl),
            DecodeShape::I => decoder.decode_i(bytes, rtl),
            DecodeShape::R => decoder.decode_r(bytes, rtl),
            DecodeShape::E => decoder.decode_e(bytes, rtl),
            DecodeShape::SetccE => decoder.decode_setcc_e(bytes, rtl),
            DecodeShape::TestI => decoder.decode_test_i(bytes, rtl),
            DecodeShape::J => decoder.decode_j(bytes, rtl),
            DecodeShape::PushSI => decoder.decode_push_si(bytes, rtl),
            DecodeShape::Gp2One => decoder.decode_gp2_one(bytes, rtl),
            DecodeShape::Gp2Cl => decoder.decode_gp2_cl(bytes, rtl),
            DecodeShape::Gp2Ib => decoder.decode_gp2_ib(bytes, rtl),
            DecodeShape::IbG2E => decoder.decode_ib_g2e(bytes, rtl),
            DecodeShape::ClG2E => decoder.decode_cl_g2e(bytes, rtl),
            DecodeShape::InI2a => decoder.decode_in_i2a(bytes, rtl),
            DecodeShape::InDx2a => decoder.decode_in_dx2a(bytes, rtl),
            DecodeShape::OutA2I => decoder.decode_out_a2i(bytes, rtl),
            DecodeShape::OutA2Dx => decoder.decode_out_a2dx(bytes, rtl),
            DecodeShape::O2a => decoder.decode_o2a(bytes, rtl),
            DecodeShape::A2O => decoder.decode_a2o(bytes, rtl),
        }
    }
}

impl Decoder {
    /// Eb <- Gb, Ev <- Gv
    pub fn decode_g2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, Some(&mut self.src), true)
    }

    pub fn decode_mov_g2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, false, Some(&mut self.src), true)
    }

    /// Gb <- Eb, Gv <- Ev
    pub fn decode_e2g(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.src, true, Some(&mut self.dest), true)
    }

    pub fn decode_mov_e2g(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.src, true, Some(&mut self.dest), false)
    }

    /// Gv <- M. Only the effective address is computed; memory is never read.
    pub fn decode_lea_m2g(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        let modrm = ModRmByte::peek(bytes)?;
        if !modrm.is_addressing_mode() {
            return Err(DecodeError::InvalidModRm(modrm.byte(), bytes.tell()));
        }
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.src, false, Some(&mut self.dest), false)
    }

    /// AL <- Ib, eAX <- Iv
    pub fn decode_i2a(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.dest, true)?;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// Gv <- EvIv
    pub fn decode_i_e2g(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.src2, true, Some(&mut self.dest), false)?;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// Gv <- EvIb, with the byte immediate sign-extended to the destination width.
    pub fn decode_si_e2g(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        assert!(
            self.dest.width == 2 || self.dest.width == 4,
            "Invalid destination width: {}",
            self.dest.width
        );
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.src2, true, Some(&mut self.dest), false)?;
        self.decode_sign_extended_ib(bytes, rtl)
    }

    /// Eb <- Ib, Ev <- Iv
    pub fn decode_i2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, None, false)?;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    pub fn decode_mov_i2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, false, None, false)?;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// Ev <- Ib, with the byte immediate sign-extended to the destination width.
    pub fn decode_si2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        assert!(
            self.dest.width == 2 || self.dest.width == 4,
            "Invalid destination width: {}",
            self.dest.width
        );
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, None, false)?;
        self.decode_sign_extended_ib(bytes, rtl)
    }

    fn decode_sign_extended_ib(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        self.src.width = 1;
        decode_op_si(&mut self.ctx, bytes, rtl, &mut self.src, true)?;
        if self.dest.width == 2 {
            self.src.val &= 0xFFFF;
        }
        Ok(())
    }

    /// XX <- Ib, eXX <- Iv
    pub fn decode_i2r(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_r(&mut self.ctx, bytes, rtl, &mut self.dest, true)?;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    pub fn decode_mov_i2r(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_r(&mut self.ctx, bytes, rtl, &mut self.dest, false)?;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// eXX <-> eAX
    pub fn decode_a2r(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_r(&mut self.ctx, bytes, rtl, &mut self.dest, true)?;
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    pub fn decode_i(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.dest, true)
    }

    pub fn decode_r(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_r(&mut self.ctx, bytes, rtl, &mut self.dest, true)
    }

    pub fn decode_e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, None, false)
    }

    pub fn decode_setcc_e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, false, None, false)
    }

    /// TEST in group 3. The destination has already been decoded by the group's E shape.
    pub fn decode_test_i(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// Jb, Jd. The branch target is resolved here, relative to the instruction pointer after the
    /// displacement.
    pub fn decode_j(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_si(&mut self.ctx, bytes, rtl, &mut self.dest, false)?;
        self.ctx.jmp_eip = (self.dest.simm as u32).wrapping_add(bytes.tell());
        self.ctx.is_jmp = true;
        log::debug!("decode_j: jump target: {:08X}", self.ctx.jmp_eip);
        Ok(())
    }

    pub fn decode_push_si(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_si(&mut self.ctx, bytes, rtl, &mut self.dest, true)
    }

    /// Shift or rotate by 1.
    pub fn decode_gp2_one(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, None, false)?;
        decode_op_one(rtl, &mut self.src);
        Ok(())
    }

    /// Shift or rotate by CL.
    pub fn decode_gp2_cl(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, None, false)?;
        decode_op_cl(rtl, &mut self.src);
        Ok(())
    }

    /// Shift or rotate by Ib.
    pub fn decode_gp2_ib(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, None, false)?;
        self.src.width = 1;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// Ev <- GvIb (shld, shrd)
    pub fn decode_ib_g2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, Some(&mut self.src2), true)?;
        self.src.width = 1;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)
    }

    /// Ev <- GvCL (shld, shrd)
    pub fn decode_cl_g2e(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_rm(&mut self.ctx, bytes, rtl, &mut self.dest, true, Some(&mut self.src2), true)?;
        decode_op_cl(rtl, &mut self.src);
        Ok(())
    }

    pub fn decode_in_i2a(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        self.src.width = 1;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.src, true)?;
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.dest, false)
    }

    pub fn decode_in_dx2a(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_dx(rtl, &mut self.src);
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.dest, false)
    }

    pub fn decode_out_a2i(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.src, true)?;
        self.dest.width = 1;
        decode_op_i(&mut self.ctx, bytes, rtl, &mut self.dest, true)
    }

    pub fn decode_out_a2dx(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.src, true)?;
        decode_op_dx(rtl, &mut self.dest);
        Ok(())
    }

    /// AL <- Ob, eAX <- Ov
    pub fn decode_o2a(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_o(&mut self.ctx, bytes, rtl, &mut self.src, true)?;
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.dest, false)
    }

    /// Ob <- AL, Ov <- eAX
    pub fn decode_a2o(&mut self, bytes: &mut impl ByteReader, rtl: &mut impl Rtl) -> Result<(), DecodeError> {
        decode_op_a(&mut self.ctx, bytes, rtl, &mut self.src, true)?;
        decode_op_o(&mut self.ctx, bytes, rtl, &mut self.dest, false)
    }
}

/// Commit `src` to the storage `op` designates.
///
/// Only register and memory operands can be written back.
pub fn operand_write(rtl: &mut impl Rtl, op: &Operand, src: RtlReg) {
    match op.kind {
        OperandKind::Register => rtl.sr(op.reg, src, op.width),
        OperandKind::Memory => rtl.sm(op.addr, src, op.width),
        _ => panic!("Invalid operand for write-back: {:?}", op.kind),
    }
}
