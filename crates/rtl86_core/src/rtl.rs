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

    rtl.rs

    Defines the register-transfer layer that the decoder stages operand
    values into, and RtlCpu, a reference backend that executes each
    micro-operation as it is emitted.

*/

use std::fmt;

use crate::cpu_common::{reg_name, width_mask};

/// A register-transfer staging cell.
pub type RtlReg = u32;

/// Emission primitives of the register-transfer layer. Implementors may execute the operation
/// immediately, record it for later, or both. The decoder never observes a result beyond the
/// destination cell.
pub trait Rtl {
    /// Load an immediate value into `dest`.
    fn li(&mut self, dest: &mut RtlReg, imm: u32);
    /// Load general purpose register `reg` at `width` bytes into `dest`.
    fn lr(&mut self, dest: &mut RtlReg, reg: u8, width: u8);
    /// Load `width` bytes of memory at `addr` into `dest`.
    fn lm(&mut self, dest: &mut RtlReg, addr: RtlReg, width: u8);
    /// Store `src` into general purpose register `reg` at `width` bytes.
    fn sr(&mut self, reg: u8, src: RtlReg, width: u8);
    /// Store `width` bytes of `src` to memory at `addr`.
    fn sm(&mut self, addr: RtlReg, src: RtlReg, width: u8);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MicroOp {
    Li { imm: u32 },
    Lr { reg: u8, width: u8 },
    Lm { addr: u32, width: u8 },
    Sr { reg: u8, width: u8, value: u32 },
    Sm { addr: u32, width: u8, value: u32 },
}

fn ptr_name(width: u8) -> &'static str {
    match width {
        1 => "byte",
        2 => "word",
        _ => "dword",
    }
}

impl fmt::Display for MicroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MicroOp::Li { imm } => write!(f, "li {:X}h", imm),
            MicroOp::Lr { reg, width } => write!(f, "lr {}", reg_name(reg, width)),
            MicroOp::Lm { addr, width } => write!(f, "lm {} [{:X}h]", ptr_name(width), addr),
            MicroOp::Sr { reg, width, value } => write!(f, "sr {} <- {:X}h", reg_name(reg, width), value),
            MicroOp::Sm { addr, width, value } => {
                write!(f, "sm {} [{:X}h] <- {:X}h", ptr_name(width), addr, value)
            }
        }
    }
}

/// A flat 32-bit machine with eight general purpose registers and little-endian memory.
///
/// Memory size is a power of two; addresses wrap within it.
pub struct RtlCpu {
    gpr: [u32; 8],
    memory: Vec<u8>,
    mem_mask: u32,
    trace: Option<Vec<MicroOp>>,
}

impl RtlCpu {
    pub fn new(memory_size: usize) -> Self {
        let mut size = memory_size.max(1);
        if !size.is_power_of_two() {
            size = size.next_power_of_two();
            log::warn!(
                "Memory size {:#X} is not a power of two, rounding up to {:#X}",
                memory_size,
                size
            );
        }
        Self {
            gpr: [0; 8],
            memory: vec![0; size],
            mem_mask: (size - 1) as u32,
            trace: None,
        }
    }

    pub fn set_trace(&mut self, state: bool) {
        self.trace = if state { Some(Vec::new()) } else { None };
    }

    /// Return the micro-operations emitted since the last call, leaving tracing enabled.
    pub fn take_trace(&mut self) -> Vec<MicroOp> {
        match &mut self.trace {
            Some(trace) => std::mem::take(trace),
            None => Vec::new(),
        }
    }

    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    /// Read a general purpose register, honoring 8 and 16-bit aliasing. Byte registers 4-7 are
    /// the high bytes of registers 0-3.
    pub fn get_register(&self, reg: u8, width: u8) -> u32 {
        let reg = (reg & 0x07) as usize;
        match width {
            1 if reg < 4 => self.gpr[reg] & 0xFF,
            1 => (self.gpr[reg - 4] >> 8) & 0xFF,
            2 => self.gpr[reg] & 0xFFFF,
            4 => self.gpr[reg],
            _ => panic!("Invalid register width: {}", width),
        }
    }

    pub fn set_register(&mut self, reg: u8, width: u8, value: u32) {
        let reg = (reg & 0x07) as usize;
        match width {
            1 if reg < 4 => self.gpr[reg] = (self.gpr[reg] & !0xFF) | (value & 0xFF),
            1 => self.gpr[reg - 4] = (self.gpr[reg - 4] & !0xFF00) | ((value & 0xFF) << 8),
            2 => self.gpr[reg] = (self.gpr[reg] & !0xFFFF) | (value & 0xFFFF),
            4 => self.gpr[reg] = value,
            _ => panic!("Invalid register width: {}", width),
        }
    }

    pub fn read_mem(&self, addr: u32, width: u8) -> u32 {
        let mut value = 0u32;
        for i in 0..width as u32 {
            let byte = self.memory[(addr.wrapping_add(i) & self.mem_mask) as usize];
            value |= (byte as u32) << (i * 8);
        }
        value & width_mask(width)
    }

    pub fn write_mem(&mut self, addr: u32, width: u8, value: u32) {
        // Validate width before touching memory.
        let value = value & width_mask(width);
        for i in 0..width as u32 {
            self.memory[(addr.wrapping_add(i) & self.mem_mask) as usize] = (value >> (i * 8)) as u8;
        }
    }

    /// Copy `image` into memory starting at `addr`.
    pub fn load_image(&mut self, addr: u32, image: &[u8]) {
        for (i, byte) in image.iter().enumerate() {
            self.memory[(addr.wrapping_add(i as u32) & self.mem_mask) as usize] = *byte;
        }
    }

    #[inline(always)]
    fn emit(&mut self, op: MicroOp) {
        if let Some(trace) = &mut self.trace {
            trace.push(op);
        }
    }
}

impl Rtl for RtlCpu {
    fn li(&mut self, dest: &mut RtlReg, imm: u32) {
        self.emit(MicroOp::Li { imm });
        *dest = imm;
    }

    fn lr(&mut self, dest: &mut RtlReg, reg: u8, width: u8) {
        self.emit(MicroOp::Lr { reg, width });
        *dest = self.get_register(reg, width);
    }

    fn lm(&mut self, dest: &mut RtlReg, addr: RtlReg, width: u8) {
        self.emit(MicroOp::Lm { addr, width });
        *dest = self.read_mem(addr, width);
    }

    fn sr(&mut self, reg: u8, src: RtlReg, width: u8) {
        self.emit(MicroOp::Sr { reg, width, value: src });
        self.set_register(reg, width, src);
    }

    fn sm(&mut self, addr: RtlReg, src: RtlReg, width: u8) {
        self.emit(MicroOp::Sm { addr, width, value: src });
        self.write_mem(addr, width, src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_common::*;

    #[test]
    fn test_register_aliasing() {
        let mut cpu = RtlCpu::new(0x1000);

        cpu.set_register(R_EAX, 4, 0x1234_5678);
        assert_eq!(cpu.get_register(R_AX, 2), 0x5678);
        assert_eq!(cpu.get_register(R_AL, 1), 0x78);
        assert_eq!(cpu.get_register(R_AH, 1), 0x56);

        cpu.set_register(R_AH, 1, 0xAB);
        assert_eq!(cpu.get_register(R_EAX, 4), 0x1234_AB78);

        cpu.set_register(R_BH, 1, 0x01);
        cpu.set_register(R_BL, 1, 0x02);
        assert_eq!(cpu.get_register(R_EBX, 4), 0x0000_0102);

        cpu.set_register(R_DX, 2, 0xFFFF_BEEF);
        assert_eq!(cpu.get_register(R_EDX, 4), 0x0000_BEEF);
    }

    #[test]
    fn test_memory_little_endian_and_wrap() {
        let mut cpu = RtlCpu::new(0x100);
        cpu.write_mem(0x10, 4, 0xDEAD_BEEF);
        assert_eq!(cpu.read_mem(0x10, 1), 0xEF);
        assert_eq!(cpu.read_mem(0x10, 2), 0xBEEF);
        assert_eq!(cpu.read_mem(0x12, 2), 0xDEAD);

        // Addresses wrap within the power-of-two memory size.
        cpu.write_mem(0xFF, 2, 0x1122);
        assert_eq!(cpu.read_mem(0xFF, 1), 0x22);
        assert_eq!(cpu.read_mem(0x00, 1), 0x11);
        assert_eq!(cpu.read_mem(0x110, 4), 0xDEAD_BEEF);
    }

    #[test]
    fn test_memory_size_rounds_up() {
        let cpu = RtlCpu::new(1000);
        assert_eq!(cpu.memory_size(), 1024);
    }

    #[test]
    fn test_trace_records_micro_ops() {
        let mut cpu = RtlCpu::new(0x100);
        let mut cell: RtlReg = 0;

        // Tracing is off by default.
        cpu.li(&mut cell, 5);
        assert!(cpu.take_trace().is_empty());

        cpu.set_trace(true);
        cpu.li(&mut cell, 5);
        cpu.sr(R_ECX, cell, 4);
        cpu.lr(&mut cell, R_CL, 1);
        cpu.sm(0x20, cell, 2);
        cpu.lm(&mut cell, 0x20, 2);

        let trace = cpu.take_trace();
        assert_eq!(
            trace,
            vec![
                MicroOp::Li { imm: 5 },
                MicroOp::Sr {
                    reg: R_ECX,
                    width: 4,
                    value: 5
                },
                MicroOp::Lr { reg: R_CL, width: 1 },
                MicroOp::Sm {
                    addr: 0x20,
                    width: 2,
                    value: 5
                },
                MicroOp::Lm { addr: 0x20, width: 2 },
            ]
        );
        assert_eq!(cell, 5);
        assert_eq!(trace[1].to_string(), "sr ecx <- 5h");
        assert_eq!(trace[3].to_string(), "sm word [20h] <- 5h");
        assert!(cpu.take_trace().is_empty());
    }
}
