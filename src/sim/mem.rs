//! Machine state storage for the SOL simulator.
//!
//! This module consists of:
//! - [`Mem`]: The word-addressed memory.
//! - [`RegFile`]: The register file.
//! - [`Stack`]: The bounded hardware stack used by `push` and `pop`.
//! - [`MachineInitStrategy`]: How the register file is filled before a program runs.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::{Reg, MAX_WORDS, REG_COUNT};

use super::SimErr;

/// Trait that describes types that can be used to create the initial data of a register.
pub trait WordFiller {
    /// Generate the data.
    fn generate(&mut self) -> i32;
}
impl WordFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> i32 {
        rand::random()
    }
}
impl WordFiller for i32 {
    /// Sets each word to the given value.
    fn generate(&mut self) -> i32 {
        *self
    }
}
impl WordFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> i32 {
        self.gen()
    }
}

/// Strategy used to initialize the `reg_file` of the [`Simulator`].
///
/// Memory always starts as the loaded program, so this only applies to registers.
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each register randomly and non-deterministically.
    Unseeded,

    /// Initializes each register randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each register to a known value.
    Known {
        /// The value to initialize each register to.
        value: i32
    }
}
impl Default for MachineInitStrategy {
    /// Registers start at zero.
    fn default() -> Self {
        MachineInitStrategy::Known { value: 0 }
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl WordFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => InitGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => InitGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => InitGenerator::Known(*value),
        }
    }
}

enum InitGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(i32)
}
impl WordFiller for InitGenerator {
    fn generate(&mut self) -> i32 {
        match self {
            InitGenerator::Unseeded  => ().generate(),
            InitGenerator::Seeded(r) => r.generate(),
            InitGenerator::Known(k)  => k.generate(),
        }
    }
}

/// Memory.
///
/// Memory starts out as exactly the loaded program and is addressed by word.
/// Valid addresses are `[0, MAX_WORDS)`.
///
/// There are two ways of accessing memory:
/// - [`Mem::get`] and [`Mem::as_slice`]: direct access to the current contents (no growth, no errors)
/// - [`Mem::read`] and [`Mem::write`]: simulated accesses, which grow memory and check the address
///
/// ```
/// use sol_ensemble::sim::mem::Mem;
///
/// let mut mem = Mem::new();
/// mem.load(&[1, 2, 3]);
/// assert_eq!(mem.get(1), Some(2));
/// assert_eq!(mem.get(5), None);
///
/// // touching an address past the end grows memory with zeros
/// mem.write(5, 9).unwrap();
/// assert_eq!(mem.as_slice(), &[1, 2, 3, 0, 0, 9]);
///
/// assert!(mem.read(-1).is_err());
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Mem {
    data: Vec<i32>
}
impl Mem {
    /// Creates a new, empty memory.
    pub fn new() -> Self {
        Default::default()
    }

    /// Replaces the contents of memory with the given words.
    pub fn load(&mut self, words: &[i32]) {
        self.data.clear();
        self.data.extend_from_slice(words);
    }

    /// The number of words currently in memory.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether memory holds no words.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The current contents of memory.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Gets the word at the given address if it is currently in memory.
    ///
    /// This is **only** meant to be used to query the state of the memory
    /// (or to fetch instructions), not to simulate a load.
    pub fn get(&self, addr: u32) -> Option<i32> {
        let i = usize::try_from(addr).ok()?;
        self.data.get(i).copied()
    }

    /// Computes the index of an effective address, growing memory to cover it.
    fn slot(&mut self, addr: i32) -> Result<&mut i32, SimErr> {
        let i = usize::try_from(addr)
            .ok()
            .filter(|&i| i < MAX_WORDS)
            .ok_or(SimErr::AccessViolation(addr))?;

        if i >= self.data.len() {
            self.data.resize(i + 1, 0);
        }
        Ok(&mut self.data[i])
    }

    /// Simulates a load from the given effective address.
    ///
    /// Addresses outside of `[0, MAX_WORDS)` raise [`SimErr::AccessViolation`].
    pub fn read(&mut self, addr: i32) -> Result<i32, SimErr> {
        self.slot(addr).map(|w| *w)
    }

    /// Simulates a store to the given effective address.
    ///
    /// Addresses outside of `[0, MAX_WORDS)` raise [`SimErr::AccessViolation`].
    pub fn write(&mut self, addr: i32, data: i32) -> Result<(), SimErr> {
        *self.slot(addr)? = data;
        Ok(())
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use sol_ensemble::sim::mem::RegFile;
/// use sol_ensemble::ast::reg_consts::R3;
///
/// let mut reg = RegFile::new(&mut 0);
/// reg[R3] = 11;
/// assert_eq!(reg[R3], 11);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile([i32; REG_COUNT]);
impl RegFile {
    /// Creates a register file, filling every register with the given filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        Self(std::array::from_fn(|_| filler.generate()))
    }

    /// The values of all registers, in register order.
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = i32;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

/// The hardware stack.
///
/// It holds at most `capacity` words. Pushing onto a full stack or popping
/// from an empty one are runtime errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    data: Vec<i32>,
    capacity: usize
}
impl Stack {
    /// Creates an empty stack with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), capacity }
    }

    /// Pushes a word onto the stack.
    pub fn push(&mut self, value: i32) -> Result<(), SimErr> {
        if self.data.len() >= self.capacity {
            return Err(SimErr::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Pops the top word off of the stack.
    pub fn pop(&mut self) -> Result<i32, SimErr> {
        self.data.pop().ok_or(SimErr::StackUnderflow)
    }

    /// The number of words on the stack.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The maximum number of words this stack holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over the stack from the top word to the bottom word.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &i32> + ExactSizeIterator + '_ {
        self.data.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R0, R15};
    use crate::ast::MAX_WORDS;
    use crate::sim::SimErr;

    use super::{MachineInitStrategy, Mem, RegFile, Stack, WordFiller};

    #[test]
    fn test_mem_bounds() {
        let mut mem = Mem::new();
        mem.load(&[7]);

        assert_eq!(mem.read(0), Ok(7));
        assert_eq!(mem.read(-5), Err(SimErr::AccessViolation(-5)));
        assert_eq!(mem.write(MAX_WORDS as i32, 1), Err(SimErr::AccessViolation(MAX_WORDS as i32)));
        assert_eq!(mem.len(), 1);

        mem.write(MAX_WORDS as i32 - 1, 1).unwrap();
        assert_eq!(mem.len(), MAX_WORDS);
        assert_eq!(mem.get(MAX_WORDS as u32 - 1), Some(1));
    }

    #[test]
    fn test_mem_read_grows() {
        let mut mem = Mem::new();
        assert_eq!(mem.read(2), Ok(0));
        assert_eq!(mem.as_slice(), &[0, 0, 0]);

        mem.load(&[4, 5]);
        assert_eq!(mem.as_slice(), &[4, 5]);
    }

    #[test]
    fn test_stack() {
        let mut stack = Stack::new(2);
        assert_eq!(stack.pop(), Err(SimErr::StackUnderflow));

        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.push(3), Err(SimErr::StackOverflow));
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), [2, 1]);

        assert_eq!(stack.pop(), Ok(2));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_init_strategy() {
        let known = RegFile::new(&mut MachineInitStrategy::default().generator());
        assert!(known.as_slice().iter().all(|&r| r == 0));

        let five = RegFile::new(&mut MachineInitStrategy::Known { value: 5 }.generator());
        assert_eq!(five[R0], 5);
        assert_eq!(five[R15], 5);

        let seeded = MachineInitStrategy::Seeded { seed: 42 };
        let a = RegFile::new(&mut seeded.generator());
        let b = RegFile::new(&mut seeded.generator());
        assert_eq!(a, b);

        let mut g = seeded.generator();
        let first = g.generate();
        assert_eq!(first, a[R0]);
    }
}
