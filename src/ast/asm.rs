//! This module holds the AST for statements from assembly source code.
//!
//! For instructions that map to bytecode instructions
//! (i.e., the AST for the bytes that the simulator can execute),
//! see [`crate::ast::sim`].
//!
//! Useful structs in this module include:
//! - [`Opcode`]: the table of every SOL mnemonic and its operand layout
//! - [`AsmInstr`]: An enum of all possible assembly source code instructions
//! - [`Directive`]: An enum of all possible assembly source code directives
//! - [`Stmt`]: The format for a single "statement" in assembly source code

use std::fmt::Write;
use std::ops::Range;

use super::{ImmOrLabel, Label, Reg};

/// The kind of value an operand position accepts.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OperandKind {
    /// A register number (`0`-`15`).
    Reg,
    /// An integer, or a label which resolves to an address or offset.
    Addr,
}

macro_rules! opcode_table {
    ($($name:ident = $code:literal, $mnemonic:literal, [$($kind:ident),*]);+ $(;)?) => {
        /// A SOL operation.
        ///
        /// Each opcode knows its numeric code, its mnemonic, and the operands it takes.
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
        pub enum Opcode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                $name
            ),+
        }

        impl Opcode {
            /// Looks up an opcode by its mnemonic.
            ///
            /// Mnemonics are case-sensitive.
            pub fn from_mnemonic(s: &str) -> Option<Self> {
                match s {
                    $($mnemonic => Some(Self::$name)),+,
                    _ => None
                }
            }

            /// The mnemonic of this opcode.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic),+
                }
            }

            /// The numeric code of this opcode, stored in bits 23-27 of an instruction.
            pub fn code(self) -> u8 {
                match self {
                    $(Self::$name => $code),+
                }
            }

            /// Every operand position this opcode can take, in order.
            pub fn operands(self) -> &'static [OperandKind] {
                match self {
                    $(Self::$name => &[$(OperandKind::$kind),*]),+
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($code => Ok(Self::$name)),+,
                    n => Err(n)
                }
            }
        }
    };
}
opcode_table! {
    Add   =  0, "add",   [Reg, Reg, Reg];
    Nand  =  1, "nand",  [Reg, Reg, Reg];
    Lw    =  2, "lw",    [Reg, Reg, Addr];
    Sw    =  3, "sw",    [Reg, Reg, Addr];
    Beq   =  4, "beq",   [Reg, Reg, Addr];
    Jarl  =  5, "jarl",  [Reg, Reg];
    Halt  =  6, "halt",  [];
    Mul   =  7, "mul",   [Reg, Reg, Reg];
    Div   =  8, "div",   [Reg, Reg, Reg];
    Imul  =  9, "imul",  [Reg, Reg, Reg];
    Xidiv = 10, "xidiv", [Reg, Reg, Reg];
    And   = 11, "and",   [Reg, Reg, Reg];
    Xor   = 12, "xor",   [Reg, Reg, Reg];
    Cmpge = 13, "cmpge", [Reg, Reg, Reg];
    Jmae  = 14, "jmae",  [Reg, Reg, Addr];
    Jmnae = 15, "jmnae", [Reg, Reg, Addr];
    Bsr   = 16, "bsr",   [Reg, Reg];
    Bsf   = 17, "bsf",   [Reg, Reg];
    Jne   = 18, "jne",   [Addr];
    Pop   = 19, "pop",   [Reg];
    Push  = 20, "push",  [Reg];
}
impl Opcode {
    /// The number of operands which must be present.
    ///
    /// This is the length of [`Opcode::operands`], except for `push` and `pop`,
    /// whose register operand is optional.
    pub fn required(self) -> usize {
        match self {
            Opcode::Push | Opcode::Pop => 0,
            _ => self.operands().len(),
        }
    }

    /// Whether this opcode's address operand is relative to the next instruction.
    pub fn is_pc_relative(self) -> bool {
        matches!(self, Opcode::Beq | Opcode::Jmae | Opcode::Jmnae | Opcode::Jne)
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// An enum representing all of the possible instructions in SOL assembly code.
///
/// The variants in this enum represent instructions before assembly passes.
///
/// For the resolved instructions the simulator executes, refer to [`SimInstr`].
///
/// [`SimInstr`]: crate::ast::sim::SimInstr
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum AsmInstr {
    /// `regC = regA + regB`
    ADD(Reg, Reg, Reg),
    /// `regC = !(regA & regB)`
    NAND(Reg, Reg, Reg),
    /// `regB = mem[regA + addr]`
    LW(Reg, Reg, ImmOrLabel),
    /// `mem[regA + addr] = regB`
    SW(Reg, Reg, ImmOrLabel),
    /// Branch if `regA == regB`
    BEQ(Reg, Reg, ImmOrLabel),
    /// Jump and link
    JARL(Reg, Reg),
    /// Stop the machine
    HALT,
    /// Unsigned multiply
    MUL(Reg, Reg, Reg),
    /// Unsigned divide
    DIV(Reg, Reg, Reg),
    /// Signed multiply
    IMUL(Reg, Reg, Reg),
    /// Signed divide, then exchange `regA` and `regB`
    XIDIV(Reg, Reg, Reg),
    /// `regC = regA & regB`
    AND(Reg, Reg, Reg),
    /// `regC = regA ^ regB`
    XOR(Reg, Reg, Reg),
    /// `regC = (regA >= regB) as i32`
    CMPGE(Reg, Reg, Reg),
    /// Branch if `regA >= regB`
    JMAE(Reg, Reg, ImmOrLabel),
    /// Branch if `regA < regB`
    JMNAE(Reg, Reg, ImmOrLabel),
    /// Bit scan reverse
    BSR(Reg, Reg),
    /// Bit scan forward
    BSF(Reg, Reg),
    /// Branch if the flag is set
    JNE(ImmOrLabel),
    /// Pop the stack into a register
    POP(Reg),
    /// Push a register onto the stack
    PUSH(Reg),
}
impl AsmInstr {
    /// Builds an instruction from its opcode and parsed operands.
    ///
    /// `regs` holds the register operands in order (missing ones are `R0`),
    /// and `addr` holds the address operand, if the opcode has one.
    pub(crate) fn from_parts(opcode: Opcode, regs: [Reg; 3], addr: ImmOrLabel) -> Self {
        let [a, b, c] = regs;
        match opcode {
            Opcode::Add   => AsmInstr::ADD(a, b, c),
            Opcode::Nand  => AsmInstr::NAND(a, b, c),
            Opcode::Lw    => AsmInstr::LW(a, b, addr),
            Opcode::Sw    => AsmInstr::SW(a, b, addr),
            Opcode::Beq   => AsmInstr::BEQ(a, b, addr),
            Opcode::Jarl  => AsmInstr::JARL(a, b),
            Opcode::Halt  => AsmInstr::HALT,
            Opcode::Mul   => AsmInstr::MUL(a, b, c),
            Opcode::Div   => AsmInstr::DIV(a, b, c),
            Opcode::Imul  => AsmInstr::IMUL(a, b, c),
            Opcode::Xidiv => AsmInstr::XIDIV(a, b, c),
            Opcode::And   => AsmInstr::AND(a, b, c),
            Opcode::Xor   => AsmInstr::XOR(a, b, c),
            Opcode::Cmpge => AsmInstr::CMPGE(a, b, c),
            Opcode::Jmae  => AsmInstr::JMAE(a, b, addr),
            Opcode::Jmnae => AsmInstr::JMNAE(a, b, addr),
            Opcode::Bsr   => AsmInstr::BSR(a, b),
            Opcode::Bsf   => AsmInstr::BSF(a, b),
            Opcode::Jne   => AsmInstr::JNE(addr),
            Opcode::Pop   => AsmInstr::POP(a),
            Opcode::Push  => AsmInstr::PUSH(a),
        }
    }

    /// The opcode of this instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            AsmInstr::ADD(..)   => Opcode::Add,
            AsmInstr::NAND(..)  => Opcode::Nand,
            AsmInstr::LW(..)    => Opcode::Lw,
            AsmInstr::SW(..)    => Opcode::Sw,
            AsmInstr::BEQ(..)   => Opcode::Beq,
            AsmInstr::JARL(..)  => Opcode::Jarl,
            AsmInstr::HALT      => Opcode::Halt,
            AsmInstr::MUL(..)   => Opcode::Mul,
            AsmInstr::DIV(..)   => Opcode::Div,
            AsmInstr::IMUL(..)  => Opcode::Imul,
            AsmInstr::XIDIV(..) => Opcode::Xidiv,
            AsmInstr::AND(..)   => Opcode::And,
            AsmInstr::XOR(..)   => Opcode::Xor,
            AsmInstr::CMPGE(..) => Opcode::Cmpge,
            AsmInstr::JMAE(..)  => Opcode::Jmae,
            AsmInstr::JMNAE(..) => Opcode::Jmnae,
            AsmInstr::BSR(..)   => Opcode::Bsr,
            AsmInstr::BSF(..)   => Opcode::Bsf,
            AsmInstr::JNE(..)   => Opcode::Jne,
            AsmInstr::POP(..)   => Opcode::Pop,
            AsmInstr::PUSH(..)  => Opcode::Push,
        }
    }
}
impl std::fmt::Display for AsmInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = self.opcode();
        match self {
            Self::ADD(a, b, c)
            | Self::NAND(a, b, c)
            | Self::MUL(a, b, c)
            | Self::DIV(a, b, c)
            | Self::IMUL(a, b, c)
            | Self::XIDIV(a, b, c)
            | Self::AND(a, b, c)
            | Self::XOR(a, b, c)
            | Self::CMPGE(a, b, c) => write!(f, "{op} {} {} {}", a.0, b.0, c.0),
            Self::LW(a, b, addr)
            | Self::SW(a, b, addr)
            | Self::BEQ(a, b, addr)
            | Self::JMAE(a, b, addr)
            | Self::JMNAE(a, b, addr) => write!(f, "{op} {} {} {addr}", a.0, b.0),
            Self::JARL(a, b)
            | Self::BSR(a, b)
            | Self::BSF(a, b) => write!(f, "{op} {} {}", a.0, b.0),
            Self::JNE(addr) => write!(f, "{op} {addr}"),
            Self::POP(r) | Self::PUSH(r) => write!(f, "{op} {}", r.0),
            Self::HALT => write!(f, "{op}"),
        }
    }
}

/// An enum representing all the possible directives in SOL assembly code.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Directive {
    /// A word of data (an integer or the address of a label).
    ///
    /// ## Examples
    /// ```text
    /// FIVE .fill 5
    /// PTR  .fill FIVE
    /// ```
    Fill(ImmOrLabel),
}
impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fill(val) => write!(f, ".fill {val}"),
        }
    }
}

/// Either an instruction or a directive.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum StmtKind {
    #[allow(missing_docs)]
    Instr(AsmInstr),
    #[allow(missing_docs)]
    Directive(Directive)
}
impl std::fmt::Display for StmtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StmtKind::Instr(i) => i.fmt(f),
            StmtKind::Directive(d) => d.fmt(f),
        }
    }
}

/// A "statement" in SOL assembly.
///
/// While not a defined term in SOL assembly,
/// a statement here refers to either an instruction or a directive,
/// and the label that is associated with it.
///
/// Every statement occupies exactly one word of memory.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Stmt {
    /// The label for the current statement, if there is one.
    pub label: Option<Label>,
    /// The instruction or directive.
    pub nucleus: StmtKind,
    /// The span of the nucleus.
    pub span: Range<usize>
}
impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(label) = &self.label {
            label.fmt(f)?;
        }
        f.write_char(' ')?;
        self.nucleus.fmt(f)
    }
}
