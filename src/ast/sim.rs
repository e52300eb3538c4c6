//! This module is used for holding simulation instructions ([`SimInstr`]),
//! which are instructions that directly map to machine words.
//!
//! For assembly instructions, see [`crate::ast::asm`].
//!
//! Every instruction shares one 32-bit layout:
//!
//! ```text
//! bits:   31..28  27..23   22..19  18..15  14..0
//! field:  unused  opcode   A       B       C
//! ```
//!
//! `C` is either a register (low 4 bits) or a signed 15-bit offset.
//! Fields an instruction does not use are zero.

use super::asm::Opcode;
use super::{IOffset, Reg};
use crate::sim::SimErr;

const OPCODE_SHIFT: u32 = 23;
const A_SHIFT: u32 = 19;
const B_SHIFT: u32 = 15;

/// The 15-bit offset field of memory and branch instructions.
pub type Offset15 = IOffset<15>;

/// An instruction as it exists in memory.
///
/// Labels are resolved by this point, so every address operand is an offset.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    /// `regC = regA + regB` (wrapping)
    ADD(Reg, Reg, Reg),
    /// `regC = !(regA & regB)`
    NAND(Reg, Reg, Reg),
    /// `regB = mem[regA + off]`
    LW(Reg, Reg, Offset15),
    /// `mem[regA + off] = regB`
    SW(Reg, Reg, Offset15),
    /// `if regA == regB { pc += off }`
    BEQ(Reg, Reg, Offset15),
    /// Jump and link
    JARL(Reg, Reg),
    /// Stop the machine
    HALT,
    /// Unsigned multiply, truncated to 32 bits
    MUL(Reg, Reg, Reg),
    /// Unsigned divide
    DIV(Reg, Reg, Reg),
    /// Signed multiply (wrapping)
    IMUL(Reg, Reg, Reg),
    /// Signed divide, then exchange `regA` and `regB`
    XIDIV(Reg, Reg, Reg),
    /// `regC = regA & regB`
    AND(Reg, Reg, Reg),
    /// `regC = regA ^ regB`
    XOR(Reg, Reg, Reg),
    /// `regC = (regA >= regB) as i32`
    CMPGE(Reg, Reg, Reg),
    /// `if regA >= regB { pc += off }`
    JMAE(Reg, Reg, Offset15),
    /// `if regA < regB { pc += off }`
    JMNAE(Reg, Reg, Offset15),
    /// `regB = leading_zeros(regA)`
    BSR(Reg, Reg),
    /// `regB = trailing_zeros(regA)`
    BSF(Reg, Reg),
    /// `if flag { pc += off }`
    JNE(Offset15),
    /// Pop the stack into a register
    POP(Reg),
    /// Push a register onto the stack
    PUSH(Reg),
}

impl SimInstr {
    /// The opcode of this instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            SimInstr::ADD(..)   => Opcode::Add,
            SimInstr::NAND(..)  => Opcode::Nand,
            SimInstr::LW(..)    => Opcode::Lw,
            SimInstr::SW(..)    => Opcode::Sw,
            SimInstr::BEQ(..)   => Opcode::Beq,
            SimInstr::JARL(..)  => Opcode::Jarl,
            SimInstr::HALT      => Opcode::Halt,
            SimInstr::MUL(..)   => Opcode::Mul,
            SimInstr::DIV(..)   => Opcode::Div,
            SimInstr::IMUL(..)  => Opcode::Imul,
            SimInstr::XIDIV(..) => Opcode::Xidiv,
            SimInstr::AND(..)   => Opcode::And,
            SimInstr::XOR(..)   => Opcode::Xor,
            SimInstr::CMPGE(..) => Opcode::Cmpge,
            SimInstr::JMAE(..)  => Opcode::Jmae,
            SimInstr::JMNAE(..) => Opcode::Jmnae,
            SimInstr::BSR(..)   => Opcode::Bsr,
            SimInstr::BSF(..)   => Opcode::Bsf,
            SimInstr::JNE(..)   => Opcode::Jne,
            SimInstr::POP(..)   => Opcode::Pop,
            SimInstr::PUSH(..)  => Opcode::Push,
        }
    }

    /// Encodes this instruction as a machine word.
    ///
    /// # Example
    /// ```
    /// use sol_ensemble::ast::reg_consts::{R0, R1, R2};
    /// use sol_ensemble::ast::sim::SimInstr;
    ///
    /// assert_eq!(SimInstr::ADD(R0, R1, R2).encode(), 32770);
    /// assert_eq!(SimInstr::HALT.encode(), 50331648);
    /// ```
    pub fn encode(&self) -> i32 {
        fn word(op: Opcode, a: i32, b: i32, c: i32) -> i32 {
            (i32::from(op.code()) << OPCODE_SHIFT) | (a << A_SHIFT) | (b << B_SHIFT) | c
        }
        fn r(reg: &Reg) -> i32 {
            i32::from(reg.0)
        }

        let op = self.opcode();
        match self {
            SimInstr::ADD(a, b, c)
            | SimInstr::NAND(a, b, c)
            | SimInstr::MUL(a, b, c)
            | SimInstr::DIV(a, b, c)
            | SimInstr::IMUL(a, b, c)
            | SimInstr::XIDIV(a, b, c)
            | SimInstr::AND(a, b, c)
            | SimInstr::XOR(a, b, c)
            | SimInstr::CMPGE(a, b, c) => word(op, r(a), r(b), r(c)),
            SimInstr::LW(a, b, off)
            | SimInstr::SW(a, b, off)
            | SimInstr::BEQ(a, b, off)
            | SimInstr::JMAE(a, b, off)
            | SimInstr::JMNAE(a, b, off) => word(op, r(a), r(b), off.bits()),
            SimInstr::JARL(a, b)
            | SimInstr::BSR(a, b)
            | SimInstr::BSF(a, b) => word(op, r(a), r(b), 0),
            SimInstr::JNE(off) => word(op, 0, 0, off.bits()),
            SimInstr::POP(a) | SimInstr::PUSH(a) => word(op, r(a), 0, 0),
            SimInstr::HALT => word(op, 0, 0, 0),
        }
    }

    /// Decodes a machine word into an instruction.
    ///
    /// This fails if the opcode field does not hold a known opcode.
    /// Bits above the opcode field are ignored.
    ///
    /// # Example
    /// ```
    /// use sol_ensemble::ast::reg_consts::R0;
    /// use sol_ensemble::ast::sim::{Offset15, SimInstr};
    ///
    /// let off = Offset15::new(-3).unwrap();
    /// assert_eq!(SimInstr::decode(33587197).unwrap(), SimInstr::BEQ(R0, R0, off));
    /// assert!(SimInstr::decode(31 << 23).is_err());
    /// ```
    pub fn decode(word: i32) -> Result<Self, SimErr> {
        let code = ((word >> OPCODE_SHIFT) & 0x1F) as u8;
        let op = Opcode::try_from(code).map_err(SimErr::IllegalOpcode)?;

        let a = Reg::from_field(word >> A_SHIFT);
        let b = Reg::from_field(word >> B_SHIFT);
        let c = Reg::from_field(word);
        let off = Offset15::new_trunc(word);

        let instr = match op {
            Opcode::Add   => SimInstr::ADD(a, b, c),
            Opcode::Nand  => SimInstr::NAND(a, b, c),
            Opcode::Lw    => SimInstr::LW(a, b, off),
            Opcode::Sw    => SimInstr::SW(a, b, off),
            Opcode::Beq   => SimInstr::BEQ(a, b, off),
            Opcode::Jarl  => SimInstr::JARL(a, b),
            Opcode::Halt  => SimInstr::HALT,
            Opcode::Mul   => SimInstr::MUL(a, b, c),
            Opcode::Div   => SimInstr::DIV(a, b, c),
            Opcode::Imul  => SimInstr::IMUL(a, b, c),
            Opcode::Xidiv => SimInstr::XIDIV(a, b, c),
            Opcode::And   => SimInstr::AND(a, b, c),
            Opcode::Xor   => SimInstr::XOR(a, b, c),
            Opcode::Cmpge => SimInstr::CMPGE(a, b, c),
            Opcode::Jmae  => SimInstr::JMAE(a, b, off),
            Opcode::Jmnae => SimInstr::JMNAE(a, b, off),
            Opcode::Bsr   => SimInstr::BSR(a, b),
            Opcode::Bsf   => SimInstr::BSF(a, b),
            Opcode::Jne   => SimInstr::JNE(off),
            Opcode::Pop   => SimInstr::POP(a),
            Opcode::Push  => SimInstr::PUSH(a),
        };

        Ok(instr)
    }
}
