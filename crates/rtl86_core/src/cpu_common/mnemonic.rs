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

    cpu_common::mnemonic.rs

    Defines the Mnemonic enum for the supported i386 integer instruction set.

*/

use strum_macros::{Display, EnumIter, IntoStaticStr};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
    #[default]
    Invalid,
    ADD,
    OR,
    ADC,
    SBB,
    AND,
    SUB,
    XOR,
    CMP,
    INC,
    DEC,
    PUSH,
    POP,
    MUL,
    IMUL,
    DIV,
    IDIV,
    NOT,
    NEG,
    TEST,
    XCHG,
    MOV,
    MOVZX,
    MOVSX,
    LEA,
    NOP,
    CWDE,
    CDQ,
    PUSHF,
    POPF,
    SAHF,
    LAHF,
    MOVS,
    CMPS,
    STOS,
    LODS,
    SCAS,
    RET,
    LEAVE,
    INT3,
    INT,
    HLT,
    CMC,
    CLC,
    STC,
    CLI,
    STI,
    CLD,
    STD,
    ROL,
    ROR,
    RCL,
    RCR,
    SHL,
    SHR,
    SAR,
    SHLD,
    SHRD,
    JO,
    JNO,
    JB,
    JAE,
    JE,
    JNE,
    JBE,
    JA,
    JS,
    JNS,
    JP,
    JNP,
    JL,
    JGE,
    JLE,
    JG,
    JMP,
    CALL,
    LOOPNE,
    LOOPE,
    LOOP,
    JECXZ,
    IN,
    OUT,
    SETO,
    SETNO,
    SETB,
    SETAE,
    SETE,
    SETNE,
    SETBE,
    SETA,
    SETS,
    SETNS,
    SETP,
    SETNP,
    SETL,
    SETGE,
    SETLE,
    SETG,
}

impl Mnemonic {
    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Mnemonic::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mnemonic_names() {
        let mut names = HashSet::new();
        for mnemonic in Mnemonic::iter() {
            let name: &'static str = mnemonic.into();
            assert_eq!(name, name.to_lowercase());
            assert_eq!(mnemonic.to_string(), name);
            assert!(names.insert(name), "duplicate mnemonic name: {}", name);
        }
        assert_eq!(Mnemonic::iter().filter(|m| !m.is_valid()).count(), 1);
    }
}
