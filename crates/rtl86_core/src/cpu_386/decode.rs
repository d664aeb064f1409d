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

    cpu_386::decode.rs

    Opcode dispatch. Reads prefixes and the opcode, selects an instruction
    template from the decode tables and runs the template's decode shape
    against the instruction stream.

    decode_instruction() operates on implementors of ByteReader, so the same
    path serves both the execute loop and a disassembly listing.

*/

use std::fmt;

use crate::{
    bytereader::ByteReader,
    cpu_386::{modrm::ModRmByte, shapes::DecodeShape, Decoder},
    cpu_common::{
        DecodeError,
        Mnemonic,
        Operand,
        OperandSize,
        OPCODE_PREFIX_0F,
        OPCODE_PREFIX_CS_OVERRIDE,
        OPCODE_PREFIX_DS_OVERRIDE,
        OPCODE_PREFIX_ES_OVERRIDE,
        OPCODE_PREFIX_FS_OVERRIDE,
        OPCODE_PREFIX_GS_OVERRIDE,
        OPCODE_PREFIX_LOCK,
        OPCODE_PREFIX_OPERAND_SIZE,
        OPCODE_PREFIX_REP,
        OPCODE_PREFIX_REPNE,
        OPCODE_PREFIX_SS_OVERRIDE,
    },
    rtl::Rtl,
};

/// Operand-type codes: b, w, v and d.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WidthClass {
    Byte,
    Word,
    Full,
    Dword,
}

impl WidthClass {
    #[inline]
    pub fn bytes(&self, operand_size: OperandSize) -> u8 {
        match self {
            WidthClass::Byte => 1,
            WidthClass::Word => 2,
            WidthClass::Full => operand_size.bytes(),
            WidthClass::Dword => 4,
        }
    }
}

/// A decode table entry.
///
/// For an entry with a nonzero `grp`, the ModR/M reg field selects a second entry from the group
/// rows at the end of [DECODE]. The group row supplies the mnemonic, and its shape (if any) runs
/// after the primary entry's shape.
#[derive(Copy, Clone, Debug)]
pub struct InstTemplate {
    pub grp: u8,
    pub mnemonic: Mnemonic,
    pub shape: DecodeShape,
    pub width: WidthClass,
    /// Narrowed source width, for movzx and movsx.
    pub src_width: Option<WidthClass>,
}

macro_rules! inst {
    ($op:literal, $grp:literal, $m:ident, $shape:ident, $w:ident) => {
        InstTemplate {
            grp: $grp,
            mnemonic: Mnemonic::$m,
            shape: DecodeShape::$shape,
            width: WidthClass::$w,
            src_width: None,
        }
    };
    ($op:literal, $grp:literal, $m:ident, $shape:ident, $w:ident, $sw:ident) => {
        InstTemplate {
            grp: $grp,
            mnemonic: Mnemonic::$m,
            shape: DecodeShape::$shape,
            width: WidthClass::$w,
            src_width: Some(WidthClass::$sw),
        }
    };
}

#[rustfmt::skip]
pub const DECODE: [InstTemplate; 296] = [
    inst!(0x00, 0, ADD,     G2E,     Byte),
    inst!(0x01, 0, ADD,     G2E,     Full),
    inst!(0x02, 0, ADD,     E2G,     Byte),
    inst!(0x03, 0, ADD,     E2G,     Full),
    inst!(0x04, 0, ADD,     I2a,     Byte),
    inst!(0x05, 0, ADD,     I2a,     Full),
    inst!(0x06, 0, Invalid, None,    Full),
    inst!(0x07, 0, Invalid, None,    Full),
    inst!(0x08, 0, OR,      G2E,     Byte),
    inst!(0x09, 0, OR,      G2E,     Full),
    inst!(0x0A, 0, OR,      E2G,     Byte),
    inst!(0x0B, 0, OR,      E2G,     Full),
    inst!(0x0C, 0, OR,      I2a,     Byte),
    inst!(0x0D, 0, OR,      I2a,     Full),
    inst!(0x0E, 0, Invalid, None,    Full),
    inst!(0x0F, 0, Invalid, None,    Full),
    inst!(0x10, 0, ADC,     G2E,     Byte),
    inst!(0x11, 0, ADC,     G2E,     Full),
    inst!(0x12, 0, ADC,     E2G,     Byte),
    inst!(0x13, 0, ADC,     E2G,     Full),
    inst!(0x14, 0, ADC,     I2a,     Byte),
    inst!(0x15, 0, ADC,     I2a,     Full),
    inst!(0x16, 0, Invalid, None,    Full),
    inst!(0x17, 0, Invalid, None,    Full),
    inst!(0x18, 0, SBB,     G2E,     Byte),
    inst!(0x19, 0, SBB,     G2E,     Full),
    inst!(0x1A, 0, SBB,     E2G,     Byte),
    inst!(0x1B, 0, SBB,     E2G,     Full),
    inst!(0x1C, 0, SBB,     I2a,     Byte),
    inst!(0x1D, 0, SBB,     I2a,     Full),
    inst!(0x1E, 0, Invalid, None,    Full),
    inst!(0x1F, 0, Invalid, None,    Full),
    inst!(0x20, 0, AND,     G2E,     Byte),
    inst!(0x21, 0, AND,     G2E,     Full),
    inst!(0x22, 0, AND,     E2G,     Byte),
    inst!(0x23, 0, AND,     E2G,     Full),
    inst!(0x24, 0, AND,     I2a,     Byte),
    inst!(0x25, 0, AND,     I2a,     Full),
    inst!(0x26, 0, Invalid, None,    Full),
    inst!(0x27, 0, Invalid, None,    Full),
    inst!(0x28, 0, SUB,     G2E,     Byte),
    inst!(0x29, 0, SUB,     G2E,     Full),
    inst!(0x2A, 0, SUB,     E2G,     Byte),
    inst!(0x2B, 0, SUB,     E2G,     Full),
    inst!(0x2C, 0, SUB,     I2a,     Byte),
    inst!(0x2D, 0, SUB,     I2a,     Full),
    inst!(0x2E, 0, Invalid, None,    Full),
    inst!(0x2F, 0, Invalid, None,    Full),
    inst!(0x30, 0, XOR,     G2E,     Byte),
    inst!(0x31, 0, XOR,     G2E,     Full),
    inst!(0x32, 0, XOR,     E2G,     Byte),
    inst!(0x33, 0, XOR,     E2G,     Full),
    inst!(0x34, 0, XOR,     I2a,     Byte),
    inst!(0x35, 0, XOR,     I2a,     Full),
    inst!(0x36, 0, Invalid, None,    Full),
    inst!(0x37, 0, Invalid, None,    Full),
    inst!(0x38, 0, CMP,     G2E,     Byte),
    inst!(0x39, 0, CMP,     G2E,     Full),
    inst!(0x3A, 0, CMP,     E2G,     Byte),
    inst!(0x3B, 0, CMP,     E2G,     Full),
    inst!(0x3C, 0, CMP,     I2a,     Byte),
    inst!(0x3D, 0, CMP,     I2a,     Full),
    inst!(0x3E, 0, Invalid, None,    Full),
    inst!(0x3F, 0, Invalid, None,    Full),
    inst!(0x40, 0, INC,     R,       Full),
    inst!(0x41, 0, INC,     R,       Full),
    inst!(0x42, 0, INC,     R,       Full),
    inst!(0x43, 0, INC,     R,       Full),
    inst!(0x44, 0, INC,     R,       Full),
    inst!(0x45, 0, INC,     R,       Full),
    inst!(0x46, 0, INC,     R,       Full),
    inst!(0x47, 0, INC,     R,       Full),
    inst!(0x48, 0, DEC,     R,       Full),
    inst!(0x49, 0, DEC,     R,       Full),
    inst!(0x4A, 0, DEC,     R,       Full),
    inst!(0x4B, 0, DEC,     R,       Full),
    inst!(0x4C, 0, DEC,     R,       Full),
    inst!(0x4D, 0, DEC,     R,       Full),
    inst!(0x4E, 0, DEC,     R,       Full),
    inst!(0x4F, 0, DEC,     R,       Full),
    inst!(0x50, 0, PUSH,    R,       Full),
    inst!(0x51, 0, PUSH,    R,       Full),
    inst!(0x52, 0, PUSH,    R,       Full),
    inst!(0x53, 0, PUSH,    R,       Full),
    inst!(0x54, 0, PUSH,    R,       Full),
    inst!(0x55, 0, PUSH,    R,       Full),
    inst!(0x56, 0, PUSH,    R,       Full),
    inst!(0x57, 0, PUSH,    R,       Full),
    inst!(0x58, 0, POP,     R,       Full),
    inst!(0x59, 0, POP,     R,       Full),
    inst!(0x5A, 0, POP,     R,       Full),
    inst!(0x5B, 0, POP,     R,       Full),
    inst!(0x5C, 0, POP,     R,       Full),
    inst!(0x5D, 0, POP,     R,       Full),
    inst!(0x5E, 0, POP,     R,       Full),
    inst!(0x5F, 0, POP,     R,       Full),
    inst!(0x60, 0, Invalid, None,    Full),
    inst!(0x61, 0, Invalid, None,    Full),
    inst!(0x62, 0, Invalid, None,    Full),
    inst!(0x63, 0, Invalid, None,    Full),
    inst!(0x64, 0, Invalid, None,    Full),
    inst!(0x65, 0, Invalid, None,    Full),
    inst!(0x66, 0, Invalid, None,    Full),
    inst!(0x67, 0, Invalid, None,    Full),
    inst!(0x68, 0, PUSH,    I,       Full),
    inst!(0x69, 0, IMUL,    IE2G,    Full),
    inst!(0x6A, 0, PUSH,    PushSI,  Byte),
    inst!(0x6B, 0, IMUL,    SIE2G,   Full),
    inst!(0x6C, 0, Invalid, None,    Full),
    inst!(0x6D, 0, Invalid, None,    Full),
    inst!(0x6E, 0, Invalid, None,    Full),
    inst!(0x6F, 0, Invalid, None,    Full),
    inst!(0x70, 0, JO,      J,       Byte),
    inst!(0x71, 0, JNO,     J,       Byte),
    inst!(0x72, 0, JB,      J,       Byte),
    inst!(0x73, 0, JAE,     J,       Byte),
    inst!(0x74, 0, JE,      J,       Byte),
    inst!(0x75, 0, JNE,     J,       Byte),
    inst!(0x76, 0, JBE,     J,       Byte),
    inst!(0x77, 0, JA,      J,       Byte),
    inst!(0x78, 0, JS,      J,       Byte),
    inst!(0x79, 0, JNS,     J,       Byte),
    inst!(0x7A, 0, JP,      J,       Byte),
    inst!(0x7B, 0, JNP,     J,       Byte),
    inst!(0x7C, 0, JL,      J,       Byte),
    inst!(0x7D, 0, JGE,     J,       Byte),
    inst!(0x7E, 0, JLE,     J,       Byte),
    inst!(0x7F, 0, JG,      J,       Byte),
    inst!(0x80, 1, Invalid, I2E,     Byte),
    inst!(0x81, 1, Invalid, I2E,     Full),
    inst!(0x82, 0, Invalid, None,    Full),
    inst!(0x83, 1, Invalid, SI2E,    Full),
    inst!(0x84, 0, TEST,    G2E,     Byte),
    inst!(0x85, 0, TEST,    G2E,     Full),
    inst!(0x86, 0, XCHG,    G2E,     Byte),
    inst!(0x87, 0, XCHG,    G2E,     Full),
    inst!(0x88, 0, MOV,     MovG2E,  Byte),
    inst!(0x89, 0, MOV,     MovG2E,  Full),
    inst!(0x8A, 0, MOV,     MovE2G,  Byte),
    inst!(0x8B, 0, MOV,     MovE2G,  Full),
    inst!(0x8C, 0, Invalid, None,    Full),
    inst!(0x8D, 0, LEA,     LeaM2G,  Full),
    inst!(0x8E, 0, Invalid, None,    Full),
    inst!(0x8F, 0, POP,     SetccE,  Full),
    inst!(0x90, 0, NOP,     None,    Full),
    inst!(0x91, 0, XCHG,    A2r,     Full),
    inst!(0x92, 0, XCHG,    A2r,     Full),
    inst!(0x93, 0, XCHG,    A2r,     Full),
    inst!(0x94, 0, XCHG,    A2r,     Full),
    inst!(0x95, 0, XCHG,    A2r,     Full),
    inst!(0x96, 0, XCHG,    A2r,     Full),
    inst!(0x97, 0, XCHG,    A2r,     Full),
    inst!(0x98, 0, CWDE,    None,    Full),
    inst!(0x99, 0, CDQ,     None,    Full),
    inst!(0x9A, 0, Invalid, None,    Full),
    inst!(0x9B, 0, Invalid, None,    Full),
    inst!(0x9C, 0, PUSHF,   None,    Full),
    inst!(0x9D, 0, POPF,    None,    Full),
    inst!(0x9E, 0, SAHF,    None,    Byte),
    inst!(0x9F, 0, LAHF,    None,    Byte),
    inst!(0xA0, 0, MOV,     O2a,     Byte),
    inst!(0xA1, 0, MOV,     O2a,     Full),
    inst!(0xA2, 0, MOV,     A2O,     Byte),
    inst!(0xA3, 0, MOV,     A2O,     Full),
    inst!(0xA4, 0, MOVS,    None,    Byte),
    inst!(0xA5, 0, MOVS,    None,    Full),
    inst!(0xA6, 0, CMPS,    None,    Byte),
    inst!(0xA7, 0, CMPS,    None,    Full),
    inst!(0xA8, 0, TEST,    I2a,     Byte),
    inst!(0xA9, 0, TEST,    I2a,     Full),
    inst!(0xAA, 0, STOS,    None,    Byte),
    inst!(0xAB, 0, STOS,    None,    Full),
    inst!(0xAC, 0, LODS,    None,    Byte),
    inst!(0xAD, 0, LODS,    None,    Full),
    inst!(0xAE, 0, SCAS,    None,    Byte),
    inst!(0xAF, 0, SCAS,    None,    Full),
    inst!(0xB0, 0, MOV,     MovI2r,  Byte),
    inst!(0xB1, 0, MOV,     MovI2r,  Byte),
    inst!(0xB2, 0, MOV,     MovI2r,  Byte),
    inst!(0xB3, 0, MOV,     MovI2r,  Byte),
    inst!(0xB4, 0, MOV,     MovI2r,  Byte),
    inst!(0xB5, 0, MOV,     MovI2r,  Byte),
    inst!(0xB6, 0, MOV,     MovI2r,  Byte),
    inst!(0xB7, 0, MOV,     MovI2r,  Byte),
    inst!(0xB8, 0, MOV,     MovI2r,  Full),
    inst!(0xB9, 0, MOV,     MovI2r,  Full),
    inst!(0xBA, 0, MOV,     MovI2r,  Full),
    inst!(0xBB, 0, MOV,     MovI2r,  Full),
    inst!(0xBC, 0, MOV,     MovI2r,  Full),
    inst!(0xBD, 0, MOV,     MovI2r,  Full),
    inst!(0xBE, 0, MOV,     MovI2r,  Full),
    inst!(0xBF, 0, MOV,     MovI2r,  Full),
    inst!(0xC0, 2, Invalid, Gp2Ib,   Byte),
    inst!(0xC1, 2, Invalid, Gp2Ib,   Full),
    inst!(0xC2, 0, RET,     I,       Word),
    inst!(0xC3, 0, RET,     None,    Full),
    inst!(0xC4, 0, Invalid, None,    Full),
    inst!(0xC5, 0, Invalid, None,    Full),
    inst!(0xC6, 0, MOV,     MovI2E,  Byte),
    inst!(0xC7, 0, MOV,     MovI2E,  Full),
    inst!(0xC8, 0, Invalid, None,    Full),
    inst!(0xC9, 0, LEAVE,   None,    Full),
    inst!(0xCA, 0, Invalid, None,    Full),
    inst!(0xCB, 0, Invalid, None,    Full),
    inst!(0xCC, 0, INT3,    None,    Byte),
    inst!(0xCD, 0, INT,     I,       Byte),
    inst!(0xCE, 0, Invalid, None,    Full),
    inst!(0xCF, 0, Invalid, None,    Full),
    inst!(0xD0, 2, Invalid, Gp2One,  Byte),
    inst!(0xD1, 2, Invalid, Gp2One,  Full),
    inst!(0xD2, 2, Invalid, Gp2Cl,   Byte),
    inst!(0xD3, 2, Invalid, Gp2Cl,   Full),
    inst!(0xD4, 0, Invalid, None,    Full),
    inst!(0xD5, 0, Invalid, None,    Full),
    inst!(0xD6, 0, Invalid, None,    Full),
    inst!(0xD7, 0, Invalid, None,    Full),
    inst!(0xD8, 0, Invalid, None,    Full),
    inst!(0xD9, 0, Invalid, None,    Full),
    inst!(0xDA, 0, Invalid, None,    Full),
    inst!(0xDB, 0, Invalid, None,    Full),
    inst!(0xDC, 0, Invalid, None,    Full),
    inst!(0xDD, 0, Invalid, None,    Full),
    inst!(0xDE, 0, Invalid, None,    Full),
    inst!(0xDF, 0, Invalid, None,    Full),
    inst!(0xE0, 0, LOOPNE,  J,       Byte),
    inst!(0xE1, 0, LOOPE,   J,       Byte),
    inst!(0xE2, 0, LOOP,    J,       Byte),
    inst!(0xE3, 0, JECXZ,   J,       Byte),
    inst!(0xE4, 0, IN,      InI2a,   Byte),
    inst!(0xE5, 0, IN,      InI2a,   Full),
    inst!(0xE6, 0, OUT,     OutA2I,  Byte),
    inst!(0xE7, 0, OUT,     OutA2I,  Full),
    inst!(0xE8, 0, CALL,    J,       Dword),
    inst!(0xE9, 0, JMP,     J,       Dword),
    inst!(0xEA, 0, Invalid, None,    Full),
    inst!(0xEB, 0, JMP,     J,       Byte),
    inst!(0xEC, 0, IN,      InDx2a,  Byte),
    inst!(0xED, 0, IN,      InDx2a,  Full),
    inst!(0xEE, 0, OUT,     OutA2Dx, Byte),
    inst!(0xEF, 0, OUT,     OutA2Dx, Full),
    inst!(0xF0, 0, Invalid, None,    Full),
    inst!(0xF1, 0, Invalid, None,    Full),
    inst!(0xF2, 0, Invalid, None,    Full),
    inst!(0xF3, 0, Invalid, None,    Full),
    inst!(0xF4, 0, HLT,     None,    Byte),
    inst!(0xF5, 0, CMC,     None,    Byte),
    inst!(0xF6, 3, Invalid, E,       Byte),
    inst!(0xF7, 3, Invalid, E,       Full),
    inst!(0xF8, 0, CLC,     None,    Byte),
    inst!(0xF9, 0, STC,     None,    Byte),
    inst!(0xFA, 0, CLI,     None,    Byte),
    inst!(0xFB, 0, STI,     None,    Byte),
    inst!(0xFC, 0, CLD,     None,    Byte),
    inst!(0xFD, 0, STD,     None,    Byte),
    inst!(0xFE, 4, Invalid, E,       Byte),
    inst!(0xFF, 5, Invalid, E,       Full),
    // Group 1: 80, 81, 83
    inst!(0x80, 1, ADD,     None,    Full),
    inst!(0x80, 1, OR,      None,    Full),
    inst!(0x80, 1, ADC,     None,    Full),
    inst!(0x80, 1, SBB,     None,    Full),
    inst!(0x80, 1, AND,     None,    Full),
    inst!(0x80, 1, SUB,     None,    Full),
    inst!(0x80, 1, XOR,     None,    Full),
    inst!(0x80, 1, CMP,     None,    Full),
    // Group 2: C0, C1, D0, D1, D2, D3
    inst!(0xD0, 2, ROL,     None,    Full),
    inst!(0xD0, 2, ROR,     None,    Full),
    inst!(0xD0, 2, RCL,     None,    Full),
    inst!(0xD0, 2, RCR,     None,    Full),
    inst!(0xD0, 2, SHL,     None,    Full),
    inst!(0xD0, 2, SHR,     None,    Full),
    inst!(0xD0, 2, Invalid, None,    Full),
    inst!(0xD0, 2, SAR,     None,    Full),
    // Group 3: F6, F7
    inst!(0xF6, 3, TEST,    TestI,   Full),
    inst!(0xF6, 3, Invalid, None,    Full),
    inst!(0xF6, 3, NOT,     None,    Full),
    inst!(0xF6, 3, NEG,     None,    Full),
    inst!(0xF6, 3, MUL,     None,    Full),
    inst!(0xF6, 3, IMUL,    None,    Full),
    inst!(0xF6, 3, DIV,     None,    Full),
    inst!(0xF6, 3, IDIV,    None,    Full),
    // Group 4: FE
    inst!(0xFE, 4, INC,     None,    Full),
    inst!(0xFE, 4, DEC,     None,    Full),
    inst!(0xFE, 4, Invalid, None,    Full),
    inst!(0xFE, 4, Invalid, None,    Full),
    inst!(0xFE, 4, Invalid, None,    Full),
    inst!(0xFE, 4, Invalid, None,    Full),
    inst!(0xFE, 4, Invalid, None,    Full),
    inst!(0xFE, 4, Invalid, None,    Full),
    // Group 5: FF
    inst!(0xFF, 5, INC,     None,    Full),
    inst!(0xFF, 5, DEC,     None,    Full),
    inst!(0xFF, 5, CALL,    None,    Full),
    inst!(0xFF, 5, Invalid, None,    Full),
    inst!(0xFF, 5, JMP,     None,    Full),
    inst!(0xFF, 5, Invalid, None,    Full),
    inst!(0xFF, 5, PUSH,    None,    Full),
    inst!(0xFF, 5, Invalid, None,    Full),
];

/// Two-byte opcodes 0F80 through 0FBF.
#[rustfmt::skip]
pub const DECODE_0F: [InstTemplate; 64] = [
    inst!(0x80, 0, JO,      J,       Dword),
    inst!(0x81, 0, JNO,     J,       Dword),
    inst!(0x82, 0, JB,      J,       Dword),
    inst!(0x83, 0, JAE,     J,       Dword),
    inst!(0x84, 0, JE,      J,       Dword),
    inst!(0x85, 0, JNE,     J,       Dword),
    inst!(0x86, 0, JBE,     J,       Dword),
    inst!(0x87, 0, JA,      J,       Dword),
    inst!(0x88, 0, JS,      J,       Dword),
    inst!(0x89, 0, JNS,     J,       Dword),
    inst!(0x8A, 0, JP,      J,       Dword),
    inst!(0x8B, 0, JNP,     J,       Dword),
    inst!(0x8C, 0, JL,      J,       Dword),
    inst!(0x8D, 0, JGE,     J,       Dword),
    inst!(0x8E, 0, JLE,     J,       Dword),
    inst!(0x8F, 0, JG,      J,       Dword),
    inst!(0x90, 0, SETO,    SetccE,  Byte),
    inst!(0x91, 0, SETNO,   SetccE,  Byte),
    inst!(0x92, 0, SETB,    SetccE,  Byte),
    inst!(0x93, 0, SETAE,   SetccE,  Byte),
    inst!(0x94, 0, SETE,    SetccE,  Byte),
    inst!(0x95, 0, SETNE,   SetccE,  Byte),
    inst!(0x96, 0, SETBE,   SetccE,  Byte),
    inst!(0x97, 0, SETA,    SetccE,  Byte),
    inst!(0x98, 0, SETS,    SetccE,  Byte),
    inst!(0x99, 0, SETNS,   SetccE,  Byte),
    inst!(0x9A, 0, SETP,    SetccE,  Byte),
    inst!(0x9B, 0, SETNP,   SetccE,  Byte),
    inst!(0x9C, 0, SETL,    SetccE,  Byte),
    inst!(0x9D, 0, SETGE,   SetccE,  Byte),
    inst!(0x9E, 0, SETLE,   SetccE,  Byte),
    inst!(0x9F, 0, SETG,    SetccE,  Byte),
    inst!(0xA0, 0, Invalid, None,    Full),
    inst!(0xA1, 0, Invalid, None,    Full),
    inst!(0xA2, 0, Invalid, None,    Full),
    inst!(0xA3, 0, Invalid, None,    Full),
    inst!(0xA4, 0, SHLD,    IbG2E,   Full),
    inst!(0xA5, 0, SHLD,    ClG2E,   Full),
    inst!(0xA6, 0, Invalid, None,    Full),
    inst!(0xA7, 0, Invalid, None,    Full),
    inst!(0xA8, 0, Invalid, None,    Full),
    inst!(0xA9, 0, Invalid, None,    Full),
    inst!(0xAA, 0, Invalid, None,    Full),
    inst!(0xAB, 0, Invalid, None,    Full),
    inst!(0xAC, 0, SHRD,    IbG2E,   Full),
    inst!(0xAD, 0, SHRD,    ClG2E,   Full),
    inst!(0xAE, 0, Invalid, None,    Full),
    inst!(0xAF, 0, IMUL,    E2G,     Full),
    inst!(0xB0, 0, Invalid, None,    Full),
    inst!(0xB1, 0, Invalid, None,    Full),
    inst!(0xB2, 0, Invalid, None,    Full),
    inst!(0xB3, 0, Invalid, None,    Full),
    inst!(0xB4, 0, Invalid, None,    Full),
    inst!(0xB5, 0, Invalid, None,    Full),
    inst!(0xB6, 0, MOVZX,   MovE2G,  Full, Byte),
    inst!(0xB7, 0, MOVZX,   MovE2G,  Full, Word),
    inst!(0xB8, 0, Invalid, None,    Full),
    inst!(0xB9, 0, Invalid, None,    Full),
    inst!(0xBA, 0, Invalid, None,    Full),
    inst!(0xBB, 0, Invalid, None,    Full),
    inst!(0xBC, 0, Invalid, None,    Full),
    inst!(0xBD, 0, Invalid, None,    Full),
    inst!(0xBE, 0, MOVSX,   MovE2G,  Full, Byte),
    inst!(0xBF, 0, MOVSX,   MovE2G,  Full, Word),
];

const GROUP_BASE: usize = 256;

/// Longest encoding the i386 accepts, prefixes included.
const MAX_INSTRUCTION_LEN: u32 = 15;

/// A fully decoded instruction. Operands hold the values staged during decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub address: u32,
    pub size: u32,
    pub prefixes: u32,
    /// The opcode, with 0F in the high byte for two-byte opcodes.
    pub opcode: u16,
    pub mnemonic: Mnemonic,
    pub operand_size: OperandSize,
    pub dest: Operand,
    pub src: Operand,
    pub src2: Operand,
    pub jump_target: Option<u32>,
}

impl DecodedInstruction {
    /// The address of the next sequential instruction.
    pub fn next_address(&self) -> u32 {
        self.address.wrapping_add(self.size)
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefixes & OPCODE_PREFIX_LOCK != 0 {
            write!(f, "lock ")?;
        }
        if self.prefixes & OPCODE_PREFIX_REP != 0 {
            write!(f, "rep ")?;
        }
        else if self.prefixes & OPCODE_PREFIX_REPNE != 0 {
            write!(f, "repne ")?;
        }
        write!(f, "{}", self.mnemonic)?;

        if let Some(target) = self.jump_target {
            return write!(f, " {:X}h", target);
        }

        let mut sep = " ";
        for op in [&self.dest, &self.src2, &self.src] {
            if !op.is_none() {
                write!(f, "{}{}", sep, op)?;
                sep = ", ";
            }
        }
        Ok(())
    }
}

impl Decoder {
    /// Decode one complete instruction at the reader's cursor: prefixes, opcode, and all operands.
    ///
    /// On success the cursor rests on the next instruction and the decode context's `seq_eip`
    /// points there. On failure no operand state should be used.
    pub fn decode_instruction(
        &mut self,
        bytes: &mut impl ByteReader,
        rtl: &mut impl Rtl,
    ) -> Result<DecodedInstruction, DecodeError> {
        let address = bytes.tell();
        let mut op_prefixes: u32 = 0;

        // Read an initial byte as our opcode or first prefix
        let mut opcode = bytes.read_u8()?;

        // Read in opcode prefixes until exhausted
        loop {
            op_prefixes |= match opcode {
                0x26 => OPCODE_PREFIX_ES_OVERRIDE,
                0x2E => OPCODE_PREFIX_CS_OVERRIDE,
                0x36 => OPCODE_PREFIX_SS_OVERRIDE,
                0x3E => OPCODE_PREFIX_DS_OVERRIDE,
                0x64 => OPCODE_PREFIX_FS_OVERRIDE,
                0x65 => OPCODE_PREFIX_GS_OVERRIDE,
                0x66 => OPCODE_PREFIX_OPERAND_SIZE,
                0xF0 => OPCODE_PREFIX_LOCK,
                0xF2 => OPCODE_PREFIX_REPNE,
                0xF3 => OPCODE_PREFIX_REP,
                0x67 => {
                    log::warn!("Address-size override at {:08X} is not supported", address);
                    return Err(DecodeError::UnsupportedOpcode(0x67, address));
                }
                _ => break,
            };
            if bytes.tell().wrapping_sub(address) >= MAX_INSTRUCTION_LEN {
                log::warn!("Prefix run at {:08X} exceeds the maximum instruction length", address);
                return Err(DecodeError::InstructionTooLong(address));
            }
            opcode = bytes.read_u8()?;
        }

        let operand_size = if op_prefixes & OPCODE_PREFIX_OPERAND_SIZE != 0 {
            self.default_size.toggled()
        }
        else {
            self.default_size
        };

        let (op_lu, full_opcode) = if opcode == 0x0F {
            op_prefixes |= OPCODE_PREFIX_0F;
            opcode = bytes.read_u8()?;
            let full_opcode = 0x0F00 | opcode as u16;
            match opcode {
                0x80..=0xBF => (&DECODE_0F[(opcode - 0x80) as usize], full_opcode),
                _ => {
                    log::warn!("Unsupported opcode {:04X} at {:08X}", full_opcode, address);
                    return Err(DecodeError::UnsupportedOpcode(full_opcode, address));
                }
            }
        }
        else {
            (&DECODE[opcode as usize], opcode as u16)
        };

        // Group instructions select their mnemonic with the ModR/M reg field. Peek it now; the
        // primary shape consumes the ModR/M byte.
        let mut mnemonic = op_lu.mnemonic;
        let mut grp_shape = DecodeShape::None;
        if op_lu.grp != 0 {
            let modrm = ModRmByte::peek(bytes)?;
            let grp_lu = &DECODE[GROUP_BASE + ((op_lu.grp as usize - 1) * 8) + modrm.op_extension() as usize];
            mnemonic = grp_lu.mnemonic;
            grp_shape = grp_lu.shape;
        }

        if !mnemonic.is_valid() {
            log::warn!("Unsupported opcode {:04X} at {:08X}", full_opcode, address);
            return Err(DecodeError::UnsupportedOpcode(full_opcode, address));
        }

        // Near branches take a rel16 under a 16-bit operand size, which truncates EIP.
        if op_lu.shape == DecodeShape::J
            && op_lu.width == WidthClass::Dword
            && operand_size == OperandSize::Operand16
        {
            log::warn!("16-bit near branch {:04X} at {:08X} is not supported", full_opcode, address);
            return Err(DecodeError::UnsupportedOpcode(full_opcode, address));
        }

        self.begin_sized(opcode, op_lu.width.bytes(operand_size), operand_size);
        if let Some(src_width) = op_lu.src_width {
            self.src.width = src_width.bytes(operand_size);
        }

        op_lu.shape.decode(self, bytes, rtl)?;
        grp_shape.decode(self, bytes, rtl)?;

        self.ctx.seq_eip = bytes.tell();
        let size = self.ctx.seq_eip.wrapping_sub(address);
        if size > MAX_INSTRUCTION_LEN {
            log::warn!("Instruction at {:08X} is {} bytes long", address, size);
            return Err(DecodeError::InstructionTooLong(address));
        }

        let instruction = DecodedInstruction {
            address,
            size,
            prefixes: op_prefixes,
            opcode: full_opcode,
            mnemonic,
            operand_size,
            dest: self.dest,
            src: self.src,
            src2: self.src2,
            jump_target: self.ctx.is_jmp.then_some(self.ctx.jmp_eip),
        };
        log::trace!("{:08X}: {}", address, instruction);
        Ok(instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytereader::InstructionStream,
        config::ConfigFileParams,
        cpu_common::*,
        rtl::RtlCpu,
    };
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    const BASE: u32 = 0x1000;

    fn test_cpu() -> RtlCpu {
        let mut cpu = RtlCpu::new(0x10000);
        for reg in 0..8 {
            cpu.set_register(reg, 4, 0x100 * (reg as u32 + 1));
        }
        cpu
    }

    fn decode_one(bytes: &[u8]) -> Result<DecodedInstruction, DecodeError> {
        let mut cpu = test_cpu();
        let mut decoder = Decoder::new(OperandSize::Operand32);
        let mut stream = InstructionStream::new(bytes, BASE);
        decoder.decode_instruction(&mut stream, &mut cpu)
    }

    fn disassemble(bytes: &[u8]) -> String {
        decode_one(bytes).unwrap().to_string()
    }

    #[test]
    fn test_table_layout() {
        // Group rows follow the one-byte map, eight per group.
        assert_eq!(DECODE.len(), GROUP_BASE + 5 * 8);
        for op in 0..GROUP_BASE {
            let entry = &DECODE[op];
            if entry.grp != 0 {
                assert_eq!(entry.mnemonic, Mnemonic::Invalid);
                assert!(entry.grp <= 5);
            }
        }
        assert_eq!(DECODE[GROUP_BASE + 8 * 2].shape, DecodeShape::TestI);

        for op in 0x40..0x48 {
            assert_eq!(DECODE[op].mnemonic, Mnemonic::INC);
            assert_eq!(DECODE[op].shape, DecodeShape::R);
        }
        assert_eq!(DECODE_0F[0x36].mnemonic, Mnemonic::MOVZX);
        assert_eq!(DECODE_0F[0x36].src_width, Some(WidthClass::Byte));
    }

    #[test]
    fn test_every_mnemonic_is_decodable() {
        let mapped: HashSet<Mnemonic> = DECODE.iter().chain(DECODE_0F.iter()).map(|entry| entry.mnemonic).collect();
        for mnemonic in Mnemonic::iter().filter(Mnemonic::is_valid) {
            assert!(mapped.contains(&mnemonic), "{:?} has no table row", mnemonic);
        }
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(disassemble(&[0x05, 0x01, 0x00, 0x00, 0x00]), "add eax, 1h");
        assert_eq!(disassemble(&[0x66, 0x05, 0x01, 0x00]), "add ax, 1h");
        assert_eq!(disassemble(&[0x83, 0xC0, 0x80]), "add eax, FFFFFF80h");
        assert_eq!(disassemble(&[0x66, 0x83, 0xC0, 0x80]), "add ax, FF80h");
        assert_eq!(disassemble(&[0x0F, 0xB6, 0xC3]), "movzx eax, bl");
        assert_eq!(disassemble(&[0x0F, 0xBF, 0xC3]), "movsx eax, bx");
        assert_eq!(disassemble(&[0xF7, 0xC0, 0x80, 0x00, 0x00, 0x00]), "test eax, 80h");
        assert_eq!(disassemble(&[0xF7, 0xD8]), "neg eax");
        assert_eq!(disassemble(&[0xC1, 0xE0, 0x04]), "shl eax, 4h");
        assert_eq!(disassemble(&[0xD1, 0xF8]), "sar eax, 1h");
        assert_eq!(disassemble(&[0xD2, 0xE3]), "shl bl, cl");
        assert_eq!(disassemble(&[0x0F, 0xA4, 0xC3, 0x04]), "shld ebx, eax, 4h");
        assert_eq!(disassemble(&[0x6B, 0xC1, 0x80]), "imul eax, ecx, FFFFFF80h");
        assert_eq!(disassemble(&[0xA1, 0x00, 0x20, 0x00, 0x00]), "mov eax, dword ptr [2000h]");
        assert_eq!(disassemble(&[0x8B, 0x44, 0x88, 0xFC]), "mov eax, dword ptr [8FCh]");
        assert_eq!(disassemble(&[0xE4, 0x60]), "in al, 60h");
        assert_eq!(disassemble(&[0xEE]), "out dx, al");
        assert_eq!(disassemble(&[0x0F, 0x94, 0xC0]), "sete al");
        assert_eq!(disassemble(&[0xF3, 0xA5]), "rep movs");
        assert_eq!(disassemble(&[0xC3]), "ret");
        assert_eq!(disassemble(&[0xCD, 0x21]), "int 21h");
        assert_eq!(disassemble(&[0x91]), "xchg ecx, eax");
        assert_eq!(disassemble(&[0x66, 0x93]), "xchg bx, ax");
    }

    #[test]
    fn test_branch_targets() {
        let inst = decode_one(&[0xEB, 0x05]).unwrap();
        assert_eq!(inst.jump_target, Some(0x1007));
        assert_eq!(inst.to_string(), "jmp 1007h");

        let inst = decode_one(&[0x0F, 0x84, 0x10, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(inst.size, 6);
        assert_eq!(inst.mnemonic, Mnemonic::JE);
        assert_eq!(inst.jump_target, Some(0x1016));

        // Indirect branches are not resolved at decode time.
        let inst = decode_one(&[0xFF, 0xE0]).unwrap();
        assert_eq!(inst.mnemonic, Mnemonic::JMP);
        assert_eq!(inst.jump_target, None);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode_one(&[0x8D, 0xC0]).err(),
            Some(DecodeError::InvalidModRm(0xC0, 0x1001))
        );
        assert_eq!(
            decode_one(&[0x0F, 0x0B]).err(),
            Some(DecodeError::UnsupportedOpcode(0x0F0B, BASE))
        );
        assert_eq!(
            decode_one(&[0x67, 0x8B, 0x00]).err(),
            Some(DecodeError::UnsupportedOpcode(0x67, BASE))
        );
        assert_eq!(
            decode_one(&[0xFF, 0xFF]).err(),
            Some(DecodeError::UnsupportedOpcode(0xFF, BASE))
        );
        assert_eq!(decode_one(&[0x05, 0x01]).err(), Some(DecodeError::ReadOutOfBounds(0x1002)));
        assert_eq!(decode_one(&[0x66]).err(), Some(DecodeError::ReadOutOfBounds(0x1001)));
    }

    #[test]
    fn test_16bit_near_branch_is_unsupported() {
        assert_eq!(
            decode_one(&[0x66, 0xE9, 0x05, 0x00, 0x90, 0x90, 0x90]).err(),
            Some(DecodeError::UnsupportedOpcode(0xE9, BASE))
        );
        assert_eq!(
            decode_one(&[0x66, 0x0F, 0x84, 0x05, 0x00, 0x90, 0x90]).err(),
            Some(DecodeError::UnsupportedOpcode(0x0F84, BASE))
        );

        // Short branches carry a byte displacement at either operand size.
        let inst = decode_one(&[0x66, 0xEB, 0x05]).unwrap();
        assert_eq!(inst.size, 3);
        assert_eq!(inst.jump_target, Some(0x1008));
    }

    #[test]
    fn test_instruction_length_limit() {
        let mut bytes = vec![0x66; 14];
        bytes.push(0x90);
        let inst = decode_one(&bytes).unwrap();
        assert_eq!(inst.size, 15);
        assert_eq!(inst.mnemonic, Mnemonic::NOP);

        let mut bytes = vec![0x66; 15];
        bytes.push(0x90);
        assert_eq!(decode_one(&bytes).err(), Some(DecodeError::InstructionTooLong(BASE)));

        // rep x10, mov dword ptr [1000h], 12345678h
        let mut bytes = vec![0xF3; 10];
        bytes.extend_from_slice(&[0xC7, 0x05, 0x00, 0x10, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(decode_one(&bytes).err(), Some(DecodeError::InstructionTooLong(BASE)));
    }

    #[test]
    fn test_prefixes() {
        let inst = decode_one(&[0x2E, 0xF0, 0x66, 0x01, 0x03]).unwrap();
        assert_eq!(inst.size, 5);
        assert_eq!(inst.operand_size, OperandSize::Operand16);
        assert_ne!(inst.prefixes & OPCODE_PREFIX_CS_OVERRIDE, 0);
        assert_ne!(inst.prefixes & OPCODE_PREFIX_LOCK, 0);
        assert_eq!(inst.dest.width, 2);
        assert_eq!(inst.to_string(), "lock add word ptr [400h], ax");
    }

    #[test]
    fn test_sequential_decode() {
        #[rustfmt::skip]
        let program = [
            0xB9, 0x05, 0x00, 0x00, 0x00,   // mov ecx, 5
            0x01, 0xC8,                     // add eax, ecx
            0x49,                           // dec ecx
            0x75, 0xFB,                     // jne -5
            0xF4,                           // hlt
        ];
        let mut cpu = test_cpu();
        let mut decoder = Decoder::new(OperandSize::Operand32);
        let mut stream = InstructionStream::new(&program, BASE);

        let mut addresses = Vec::new();
        while !stream.at_end() {
            let inst = decoder.decode_instruction(&mut stream, &mut cpu).unwrap();
            assert_eq!(decoder.context().seq_eip(), inst.next_address());
            addresses.push(inst.address);
            if inst.mnemonic == Mnemonic::JNE {
                assert_eq!(inst.jump_target, Some(0x1005));
            }
        }
        assert_eq!(addresses, vec![0x1000, 0x1005, 0x1007, 0x1008, 0x100A]);
    }

    #[test]
    fn test_decoder_from_config() {
        let config = ConfigFileParams::from_toml_str("[decoder]\noperand_size = 16\n").unwrap();
        let mut decoder = Decoder::from_config(&config);
        let mut cpu = test_cpu();

        let bytes = [0xB8, 0x34, 0x12];
        let mut stream = InstructionStream::new(&bytes, BASE);
        let inst = decoder.decode_instruction(&mut stream, &mut cpu).unwrap();
        assert_eq!(inst.to_string(), "mov ax, 1234h");
        assert_eq!(decoder.context().operand_size(), OperandSize::Operand16);
    }
}
