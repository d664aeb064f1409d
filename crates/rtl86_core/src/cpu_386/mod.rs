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

    cpu_386::mod.rs

    Implements the decode context and the Decoder that owns it. A Decoder
    holds the state for exactly one instruction at a time; every decode pass
    begins by resetting it.

*/

pub mod addressing;
pub mod decode;
pub mod modrm;
pub mod shapes;

pub use decode::{DecodedInstruction, InstTemplate, WidthClass};
pub use shapes::{operand_write, DecodeShape};

use crate::{
    config::CoreConfig,
    cpu_common::{Operand, OperandSize},
    rtl::RtlReg,
};

/// Staging cells shared by the decoder and the execute stage. Cleared at the start of every
/// decode pass; nothing in here survives from one instruction to the next.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScratchPool {
    pub t0: RtlReg,
    pub t1: RtlReg,
    pub t2: RtlReg,
    pub t3: RtlReg,
    pub at: RtlReg,
}

impl ScratchPool {
    pub fn clear(&mut self) {
        *self = ScratchPool::default();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeContext {
    pub(crate) opcode: u8,
    pub(crate) is_jmp: bool,
    pub(crate) jmp_eip: u32,
    pub(crate) seq_eip: u32,
    pub(crate) operand_size: OperandSize,
    pub scratch: ScratchPool,
}

impl DecodeContext {
    pub fn new(operand_size: OperandSize) -> Self {
        Self {
            operand_size,
            ..Default::default()
        }
    }

    /// Prepare the context for decoding a new instruction.
    pub fn reset(&mut self, opcode: u8, operand_size: OperandSize) {
        self.opcode = opcode;
        self.is_jmp = false;
        self.jmp_eip = 0;
        self.seq_eip = 0;
        self.operand_size = operand_size;
        self.scratch.clear();
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// True if the instruction is a relative branch whose target was resolved during decode.
    #[inline]
    pub fn is_jmp(&self) -> bool {
        self.is_jmp
    }

    /// The resolved branch target. Only meaningful when [DecodeContext::is_jmp] is set.
    #[inline]
    pub fn jmp_eip(&self) -> u32 {
        self.jmp_eip
    }

    /// Address of the instruction following the one just decoded.
    #[inline]
    pub fn seq_eip(&self) -> u32 {
        self.seq_eip
    }

    #[inline]
    pub fn operand_size(&self) -> OperandSize {
        self.operand_size
    }
}

/// Owns the decode context and the three operand slots populated by the instruction-class
/// decoders: a destination, a source and a secondary source.
#[derive(Clone, Debug)]
pub struct Decoder {
    pub(crate) ctx: DecodeContext,
    pub(crate) default_size: OperandSize,
    pub dest: Operand,
    pub src: Operand,
    pub src2: Operand,
}

impl Decoder {
    pub fn new(default_size: OperandSize) -> Self {
        Self {
            ctx: DecodeContext::new(default_size),
            default_size,
            dest: Operand::default(),
            src: Operand::default(),
            src2: Operand::default(),
        }
    }

    pub fn from_config(config: &impl CoreConfig) -> Self {
        Decoder::new(config.get_operand_size())
    }

    #[inline]
    pub fn context(&self) -> &DecodeContext {
        &self.ctx
    }

    /// Begin a decode pass for `opcode`. The context is reset and all three operand slots are
    /// cleared and given `width`; shapes narrow individual slots as their encoding requires.
    pub fn begin(&mut self, opcode: u8, width: u8) {
        self.begin_sized(opcode, width, self.default_size);
    }

    pub(crate) fn begin_sized(&mut self, opcode: u8, width: u8, operand_size: OperandSize) {
        self.ctx.reset(opcode, operand_size);
        self.dest = Operand::with_width(width);
        self.src = Operand::with_width(width);
        self.src2 = Operand::with_width(width);
    }
}
