//! Components relating to the abstract syntax trees (ASTs)
//! used in representing SOL instructions.
//!
//! These components together are used to construct...
//! - [`asm::AsmInstr`] (a data structure holding an assembly source code instruction),
//! - [`asm::Directive`] (a data structure holding an assembly source code directive),
//! - and [`sim::SimInstr`] (a data structure holding a machine word instruction).
//!
//! This module also holds the machine limits shared by the assembler and the simulator.

pub mod asm;
pub mod sim;

use std::num::TryFromIntError;

/// Maximum program size, in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536;
/// Width of the data bus, in bits.
pub const BUS_LENGTH: usize = 32;
/// Maximum number of words in a program (and the size of the address space).
///
/// This also bounds the number of labels a program can define.
pub const MAX_WORDS: usize = MAX_PROGRAM_SIZE / BUS_LENGTH * 8;
/// Number of general purpose registers.
pub const REG_COUNT: usize = 16;
/// Maximum number of words on the machine stack.
pub const STACK_CAPACITY: usize = 32;
/// The register `push` and `pop` operate on when none is given.
pub const STACK_REG: Reg = Reg(1);

/// A register. Must be between 0 and 15.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// ## Examples
///
/// ```text
/// L add 0 1 2
///       ~ ~ ~
///   lw 3 4 DATA
///      ~ ~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    macro_rules! reg_consts {
        ($($name:ident = $n:literal),+) => {
            $(
                #[doc = concat!("Register ", stringify!($n), " of the register file.")]
                pub const $name: Reg = Reg($n);
            )+
        }
    }
    reg_consts! {
        R0 = 0, R1 = 1, R2 = 2, R3 = 3, R4 = 4, R5 = 5, R6 = 6, R7 = 7,
        R8 = 8, R9 = 9, R10 = 10, R11 = 11, R12 = 12, R13 = 13, R14 = 14, R15 = 15
    }
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 15.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Reads a register out of a 4-bit instruction field.
    pub(crate) fn from_field(bits: i32) -> Self {
        Reg((bits & 0xF) as u8)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in the simulator.
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match usize::from(value) < REG_COUNT {
            true  => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            false => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}
impl TryFrom<i32> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u8::try_from(value).and_then(Reg::try_from)
    }
}

/// A signed offset that fits in `N` bits.
///
/// The 15-bit form, `IOffset<15>`, is the offset/address field of
/// memory and branch instructions.
///
/// ## Examples
///
/// ```text
///   lw 0 1 5
///          ~
///   beq 0 1 -3
///           ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct IOffset<const N: u32>(i32);

/// The error from calling [`IOffset::new`] with a value that does not fit.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct OffsetNewErr {
    /// The bit size the value had to fit in.
    pub bits: u32
}
impl std::fmt::Display for OffsetNewErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value is too big for signed {}-bit integer", self.bits)
    }
}
impl std::error::Error for OffsetNewErr {}
impl crate::err::Error for OffsetNewErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        let n = self.bits;
        Some(format!("the range for a signed {n}-bit integer is [{}, {}]", (-1i64) << (n - 1), (1i64 << (n - 1)) - 1).into())
    }
}

impl<const N: u32> IOffset<N> {
    fn truncate(n: i32) -> i32 {
        (n << (i32::BITS - N)) >> (i32::BITS - N)
    }

    /// Creates a new offset value.
    /// This must fit within `N` bits of the representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sol_ensemble::ast::IOffset;
    /// #
    /// assert!(IOffset::<15>::new(-16384).is_ok());
    /// assert!(IOffset::<15>::new(16383).is_ok());
    /// assert!(IOffset::<15>::new(16384).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is zero or larger than 32.
    pub fn new(n: i32) -> Result<Self, OffsetNewErr> {
        assert!(0 < N && N <= i32::BITS, "bit size {N} exceeds size of backing ({})", i32::BITS);
        match n == Self::truncate(n) {
            true  => Ok(IOffset(n)),
            false => Err(OffsetNewErr { bits: N }),
        }
    }

    /// Creates a new offset by sign-extending the first N bits of the integer,
    /// and discarding the rest.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sol_ensemble::ast::IOffset;
    /// #
    /// assert_eq!(IOffset::<15>::new_trunc(0x7FFF).get(), -1);     // bit 14 set
    /// assert_eq!(IOffset::<15>::new_trunc(0x3FFF).get(), 16383);  // bit 14 clear
    /// assert_eq!(IOffset::<15>::new_trunc(0x18005).get(), 5);     // upper bits dropped
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is zero or larger than 32.
    pub fn new_trunc(n: i32) -> Self {
        assert!(0 < N && N <= i32::BITS, "bit size {N} exceeds size of backing ({})", i32::BITS);
        Self(Self::truncate(n))
    }

    /// Gets the value of the offset.
    pub fn get(&self) -> i32 {
        self.0
    }

    /// Gets the low `N` bits of the offset, as they appear in an instruction field.
    pub fn bits(&self) -> i32 {
        match N {
            32 => self.0,
            _  => self.0 & ((1 << N) - 1),
        }
    }
}
impl<const N: u32> std::fmt::Display for IOffset<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An integer or a label.
///
/// This is used to represent address operands
/// (the last operand of `lw`, `sw` and the conditional branches,
/// and the only operand of `jne` and `.fill`).
///
/// During the second assembly pass, the label is resolved and
/// replaced with an address or a PC-relative offset.
///
/// ## Examples
/// ```text
///   lw 0 1 DATA
///          ~~~~
///   beq 0 1 -3
///           ~~
///   jne LOOP
///       ~~~~
/// DATA .fill 42
///            ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ImmOrLabel {
    #[allow(missing_docs)]
    Imm(i32),
    #[allow(missing_docs)]
    Label(Label)
}
impl std::fmt::Display for ImmOrLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmOrLabel::Imm(imm)     => imm.fmt(f),
            ImmOrLabel::Label(label) => label.fmt(f),
        }
    }
}

/// A label.
///
/// This struct stores the name of the label (accessible by the `name` field)
/// and the source code span indicating where the label is located in assembly source code.
///
/// # Examples
/// ```text
/// LOOP add 1 2 1
/// ~~~~
///   beq 1 3 DONE
///           ~~~~
///   beq 0 0 LOOP
///           ~~~~
/// DONE halt
/// ~~~~
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Label {
    /// The label's identifier
    pub name: String,

    /// The start of the label in assembly source code.
    ///
    /// Since name stores the length of the string,
    /// we don't need to store the whole span.
    start: usize
}
impl Label {
    /// Creates a new label.
    pub fn new(name: String, span: std::ops::Range<usize>) -> Self {
        debug_assert_eq!(span.start + name.len(), span.end, "span should have the same length as name");
        Label { name, start: span.start }
    }
    /// Returns the span of the label in assembly source code.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start .. (self.start + self.name.len())
    }
}
impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::{IOffset, Reg, MAX_WORDS};

    #[test]
    fn test_limits() {
        assert_eq!(MAX_WORDS, 16384);
    }

    #[test]
    fn test_reg_range() {
        assert_eq!(Reg::try_from(0u8).map(Reg::reg_no), Ok(0));
        assert_eq!(Reg::try_from(15u8).map(Reg::reg_no), Ok(15));
        assert!(Reg::try_from(16u8).is_err());
        assert!(Reg::try_from(-1i32).is_err());
        assert!(Reg::try_from(300i32).is_err());
    }

    #[test]
    fn test_offset_bits() {
        let neg = IOffset::<15>::new(-3).unwrap();
        assert_eq!(neg.bits(), 0x7FFD);
        assert_eq!(IOffset::<15>::new_trunc(neg.bits()), neg);

        let pos = IOffset::<15>::new(2).unwrap();
        assert_eq!(pos.bits(), 2);
    }
}
