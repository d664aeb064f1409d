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

    cpu_386::addressing.rs

    Addressing-method primitives. Each primitive fills in one Operand,
    consuming whatever instruction bytes its encoding requires and emitting
    value loads into the register-transfer layer.

*/

//! Primitives are named after the addressing-method codes of the i386 manual (Appendix A):
//!
//! - `I`  immediate data following the opcode
//! - `SI` signed immediate, sign-extended to 32 bits
//! - `a`  the accumulator (AL/AX/EAX), implied by the opcode
//! - `r`  a general register encoded in the low three bits of the opcode
//! - `E`/`G` a ModR/M-selected register-or-memory operand and its reg-field register
//! - `O`  a 32-bit direct memory offset, with no ModR/M byte
//!
//! Every primitive takes the operand's width as already set by the caller.

use crate::{
    bytereader::ByteReader,
    cpu_386::{modrm::ModRmByte, DecodeContext},
    cpu_common::{reg_name, DecodeError, Operand, OperandKind, R_CL, R_DX, R_EAX},
    rtl::Rtl,
};

/// Sign-extend the low `width` bytes of `value` to 32 bits.
#[inline]
pub fn sign_extend(value: u32, width: u8) -> u32 {
    match width {
        1 => value as u8 as i8 as i32 as u32,
        2 => value as u16 as i16 as i32 as u32,
        4 => value,
        _ => panic!("Invalid operand width: {}", width),
    }
}

/// Ib, Iw, Iv
///
/// Immediates stage their value unconditionally; `_load` is accepted for a uniform signature.
pub fn decode_op_i(
    _ctx: &mut DecodeContext,
    bytes: &mut impl ByteReader,
    rtl: &mut impl Rtl,
    op: &mut Operand,
    _load: bool,
) -> Result<(), DecodeError> {
    op.kind = OperandKind::Immediate;
    op.imm = bytes.read(op.width)?;
    rtl.li(&mut op.val, op.imm);
    log::trace!("decode_op_i: {:X}h width: {}", op.imm, op.width);
    Ok(())
}

/// Signed immediate: Ib or Id, sign-extended to 32 bits.
///
/// A 16-bit signed immediate is never produced by a correctly built decode table.
pub fn decode_op_si(
    _ctx: &mut DecodeContext,
    bytes: &mut impl ByteReader,
    rtl: &mut impl Rtl,
    op: &mut Operand,
    _load: bool,
) -> Result<(), DecodeError> {
    assert!(
        op.width == 1 || op.width == 4,
        "Invalid signed immediate width: {}",
        op.width
    );

    op.kind = OperandKind::Immediate;
    op.imm = bytes.read(op.width)?;
    let extended = sign_extend(op.imm, op.width);
    op.simm = extended as i32;
    rtl.li(&mut op.val, extended);
    log::trace!("decode_op_si: {:X}h width: {}", extended, op.width);
    Ok(())
}

/// AL, eAX
pub fn decode_op_a(
    _ctx: &mut DecodeContext,
    _bytes: &mut impl ByteReader,
    rtl: &mut impl Rtl,
    op: &mut Operand,
    load: bool,
) -> Result<(), DecodeError> {
    op.kind = OperandKind::Register;
    op.reg = R_EAX;
    if load {
        rtl.lr(&mut op.val, R_EAX, op.width);
    }
    Ok(())
}

/// XX: AL, CL, DL, BL, AH, CH, DH, BH
/// eXX: eAX, eCX, eDX, eBX, eSP, eBP, eSI, eDI
pub fn decode_op_r(
    ctx: &mut DecodeContext,
    _bytes: &mut impl ByteReader,
    rtl: &mut impl Rtl,
    op: &mut Operand,
    load: bool,
) -> Result<(), DecodeError> {
    op.kind = OperandKind::Register;
    op.reg = ctx.opcode & 0x07;
    if load {
        rtl.lr(&mut op.val, op.reg, op.width);
    }
    log::trace!("decode_op_r: {}", reg_name(op.reg, op.width));
    Ok(())
}

/// Eb, Ew, Ev, Gb, Gv, M
///
/// The whole ModR/M encoding is decoded at once; `reg` receives the reg-field operand when the
/// instruction has one.
pub fn decode_op_rm(
    ctx: &mut DecodeContext,
    bytes: &mut impl ByteReader,
    rtl: &mut impl Rtl,
    rm: &mut Operand,
    load_rm: bool,
    reg: Option<&mut Operand>,
    load_reg: bool,
) -> Result<(), DecodeError> {
    ModRmByte::resolve(bytes, rtl, &mut ctx.scratch, rm, load_rm, reg, load_reg)?;
    Ok(())
}

/// Ob, Ov
pub fn decode_op_o(
    _ctx: &mut DecodeContext,
    bytes: &mut impl ByteReader,
    rtl: &mut impl Rtl,
    op: &mut Operand,
    load: bool,
) -> Result<(), DecodeError> {
    op.kind = OperandKind::Memory;
    let offset = bytes.read_u32()?;
    rtl.li(&mut op.addr, offset);
    if load {
        rtl.lm(&mut op.val, op.addr, op.width);
    }
    log::trace!("decode_op_o: [{:X}h]", offset);
    Ok(())
}

/// The CL count register used by shift and rotate instructions.
pub fn decode_op_cl(rtl: &mut impl Rtl, op: &mut Operand) {
    op.kind = OperandKind::Register;
    op.width = 1;
    op.reg = R_CL;
    rtl.lr(&mut op.val, R_CL, 1);
}

/// The DX port register used by port I/O.
pub fn decode_op_dx(rtl: &mut impl Rtl, op: &mut Operand) {
    op.kind = OperandKind::Register;
    op.width = 2;
    op.reg = R_DX;
    rtl.lr(&mut op.val, R_DX, 2);
}

/// The implicit constant 1 of single-bit shifts and rotates.
pub fn decode_op_one(rtl: &mut impl Rtl, op: &mut Operand) {
    op.kind = OperandKind::Immediate;
    op.imm = 1;
    rtl.li(&mut op.val, 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytereader::InstructionStream,
        cpu_common::*,
        rtl::{MicroOp, RtlCpu},
    };

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x80, 1), 0xFFFF_FF80);
        assert_eq!(sign_extend(0x7F, 1), 0x7F);
        assert_eq!(sign_extend(0x8000, 2), 0xFFFF_8000);
        assert_eq!(sign_extend(0x8000_0000, 4), 0x8000_0000);
    }

    #[test]
    fn test_signed_immediate() {
        let mut ctx = DecodeContext::default();
        let mut cpu = RtlCpu::new(0x100);

        let bytes = [0x80];
        let mut stream = InstructionStream::new(&bytes, 0);
        let mut op = Operand::with_width(1);
        decode_op_si(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();
        assert!(op.is_immediate());
        assert_eq!(op.val, 0xFFFF_FF80);
        assert_eq!(op.simm, -128);
        assert_eq!(stream.tell(), 1);

        let bytes = [0x7F];
        let mut stream = InstructionStream::new(&bytes, 0);
        let mut op = Operand::with_width(1);
        decode_op_si(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();
        assert_eq!(op.val, 0x7F);

        // 32-bit signed immediates are used as-is.
        let bytes = [0x00, 0x00, 0x00, 0x80];
        let mut stream = InstructionStream::new(&bytes, 0);
        let mut op = Operand::with_width(4);
        decode_op_si(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();
        assert_eq!(op.val, 0x8000_0000);
        assert_eq!(stream.tell(), 4);
    }

    #[test]
    #[should_panic(expected = "Invalid signed immediate width")]
    fn test_signed_immediate_word_panics() {
        let mut ctx = DecodeContext::default();
        let mut cpu = RtlCpu::new(0x100);
        let bytes = [0x80, 0xFF];
        let mut stream = InstructionStream::new(&bytes, 0);
        let mut op = Operand::with_width(2);
        let _ = decode_op_si(&mut ctx, &mut stream, &mut cpu, &mut op, true);
    }

    #[test]
    fn test_immediate_widths() {
        let mut ctx = DecodeContext::default();
        let mut cpu = RtlCpu::new(0x100);
        let bytes = [0x78, 0x56, 0x34, 0x12];

        for (width, expected) in [(1, 0x78), (2, 0x5678), (4, 0x1234_5678)] {
            let mut stream = InstructionStream::new(&bytes, 0);
            let mut op = Operand::with_width(width);
            decode_op_i(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();
            assert_eq!(op.imm, expected);
            assert_eq!(op.val, expected);
            assert_eq!(stream.tell(), width as u32);
        }

        let mut stream = InstructionStream::new(&bytes[..3], 0);
        let mut op = Operand::with_width(4);
        assert_eq!(
            decode_op_i(&mut ctx, &mut stream, &mut cpu, &mut op, true),
            Err(DecodeError::ReadOutOfBounds(3))
        );
    }

    #[test]
    fn test_opcode_register_selection() {
        let mut cpu = RtlCpu::new(0x100);
        for i in 0..8 {
            cpu.set_register(i, 4, 0x1000 + i as u32);
        }
        let mut stream = InstructionStream::new(&[], 0);

        for opcode in 0..=255u8 {
            let mut ctx = DecodeContext::default();
            ctx.opcode = opcode;
            let mut op = Operand::with_width(4);
            decode_op_r(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();
            assert!(op.is_register());
            assert_eq!(op.reg, opcode & 0x07);
            assert_eq!(op.val, 0x1000 + (opcode & 0x07) as u32);
        }
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn test_accumulator_load_flag() {
        let mut ctx = DecodeContext::default();
        let mut cpu = RtlCpu::new(0x100);
        cpu.set_register(R_EAX, 4, 0xAABB_CCDD);
        let mut stream = InstructionStream::new(&[], 0);

        let mut op = Operand::with_width(2);
        decode_op_a(&mut ctx, &mut stream, &mut cpu, &mut op, false).unwrap();
        assert_eq!(op.reg, R_AX);
        assert_eq!(op.val, 0);

        decode_op_a(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();
        assert_eq!(op.val, 0xCCDD);
    }

    #[test]
    fn test_direct_offset() {
        let mut ctx = DecodeContext::default();
        let mut cpu = RtlCpu::new(0x10000);
        cpu.write_mem(0x2000, 4, 0x1234_5678);
        cpu.set_trace(true);

        // A ModR/M-like byte after the offset must be left alone.
        let bytes = [0x00, 0x20, 0x00, 0x00, 0xC0];
        let mut stream = InstructionStream::new(&bytes, 0);
        let mut op = Operand::with_width(2);
        decode_op_o(&mut ctx, &mut stream, &mut cpu, &mut op, true).unwrap();

        assert_eq!(stream.tell(), 4);
        assert!(op.is_memory());
        assert_eq!(op.addr, 0x2000);
        assert_eq!(op.val, 0x5678);
        assert_eq!(
            cpu.take_trace(),
            vec![MicroOp::Li { imm: 0x2000 }, MicroOp::Lm { addr: 0x2000, width: 2 }]
        );
    }

    #[test]
    fn test_implicit_operands() {
        let mut cpu = RtlCpu::new(0x100);
        cpu.set_register(R_ECX, 4, 0x0000_0105);
        cpu.set_register(R_EDX, 4, 0x0001_03F8);

        let mut op = Operand::with_width(4);
        decode_op_cl(&mut cpu, &mut op);
        assert_eq!((op.reg, op.width, op.val), (R_CL, 1, 0x05));

        let mut op = Operand::with_width(4);
        decode_op_dx(&mut cpu, &mut op);
        assert_eq!((op.reg, op.width, op.val), (R_DX, 2, 0x03F8));

        let mut op = Operand::with_width(1);
        decode_op_one(&mut cpu, &mut op);
        assert!(op.is_immediate());
        assert_eq!(op.val, 1);
    }
}
