//! Simulating and execution for SOL machine code.
//!
//! This module is focused on executing fully assembled code (i.e., [`ObjectFile`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates assembled code.
//! - [`mem`]: The module handling memory, registers, and the stack.
//! - [`trace`]: The module which writes the execution trace of a program.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load an object file to it:
//!
//! ```no_run
//! use sol_ensemble::sim::Simulator;
//!
//! # let obj_file = panic!("don't actually make an object file");
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_obj_file(&obj_file).unwrap();
//! simulator.run().unwrap();
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish to start every register at a seeded random value, we can edit the flags like so:
//!
//! ```no_run
//! # use sol_ensemble::sim::{Simulator, SimFlags};
//! use sol_ensemble::sim::mem::MachineInitStrategy;
//!
//! let mut simulator = Simulator::new(SimFlags {
//!     machine_init: MachineInitStrategy::Seeded { seed: 2110 },
//!     ..Default::default()
//! });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting),
//! there are also:
//! - [`Simulator::step_in`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use sol_ensemble::asm::assemble;
//! use sol_ensemble::sim::Simulator;
//! use sol_ensemble::ast::reg_consts::{R0, R2};
//!
//! let src = "
//!     lw 0 2 ONE
//!     add 0 2 0
//!     add 0 2 0
//!     halt
//! ONE .fill 1
//! ";
//! let obj_file = assemble(src).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file).unwrap();
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R2], 1);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 1);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 2);
//! sim.step_in().unwrap();
//! assert!(sim.hit_halt());
//! assert_eq!(sim.pc, 3);
//! ```
//!
//! ## Querying State
//!
//! All of the machine state is public:
//! - the PC is the `sim.pc` field,
//! - the register file is the `sim.reg_file` field (indexed by [`Reg`]),
//! - memory is the `sim.mem` field (see [`Mem`] for its access methods),
//! - the stack and flag are the `sim.stack` and `sim.flag` fields.
//!
//! ```
//! use sol_ensemble::sim::Simulator;
//! use sol_ensemble::ast::reg_consts::R0;
//!
//! let mut sim = Simulator::new(Default::default());
//!
//! sim.reg_file[R0] = 0x1234;
//! assert_eq!(sim.reg_file[R0], 0x1234);
//!
//! sim.mem.write(10, 0x5678).unwrap();
//! assert_eq!(sim.mem.get(10), Some(0x5678));
//! assert!(sim.mem.write(-1, 0).is_err());
//! ```
//!
//! [`Reg`]: crate::ast::Reg
//! [`Mem`]: self::mem::Mem
pub mod mem;
pub mod trace;

use crate::asm::ObjectFile;
use crate::ast::sim::SimInstr;
use crate::ast::{Reg, MAX_WORDS, STACK_CAPACITY};

use self::mem::{MachineInitStrategy, Mem, RegFile, Stack};

/// Errors that can occur during simulation.
///
/// All of these are fatal: the machine cannot continue after one is raised.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimErr {
    /// Word was decoded, but the opcode was not recognized.
    IllegalOpcode(u8),
    /// `div` or `xidiv` was executed with a zero divisor.
    DivideByZero,
    /// A load or store used an address outside of memory.
    AccessViolation(i32),
    /// `push` was executed on a full stack.
    StackOverflow,
    /// `pop` was executed on an empty stack.
    StackUnderflow,
    /// The PC was set to (or left at) an address with no instruction.
    PcOutOfBounds(i64),
    /// The loaded object file does not fit in memory.
    ProgramTooLarge(usize),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalOpcode(op)    => write!(f, "simulator executed illegal opcode {op}"),
            SimErr::DivideByZero         => f.write_str("division by zero"),
            SimErr::AccessViolation(ea)  => write!(f, "access violation at address {ea}"),
            SimErr::StackOverflow        => f.write_str("stack overflow"),
            SimErr::StackUnderflow       => f.write_str("stack underflow"),
            SimErr::PcOutOfBounds(pc)    => write!(f, "program counter {pc} is outside of memory"),
            SimErr::ProgramTooLarge(n)   => write!(f, "program of {n} words does not fit in memory"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::IllegalOpcode(_)   => Some("the program may have run into a data word (.fill) without halting".into()),
            SimErr::DivideByZero       => None,
            SimErr::AccessViolation(_) => Some(format!("memory addresses range from 0 to {}", MAX_WORDS - 1).into()),
            SimErr::StackOverflow      => Some(format!("the stack holds at most {STACK_CAPACITY} words by default").into()),
            SimErr::StackUnderflow     => Some("every pop must be preceded by a matching push".into()),
            SimErr::PcOutOfBounds(_)   => Some("programs must end with a halt instruction".into()),
            SimErr::ProgramTooLarge(_) => Some(format!("memory holds at most {MAX_WORDS} words").into()),
        }
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// A halt was executed.
    Halt,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// Program hit a tripwire condition.
    Tripwire,
    /// Program hit an error or has not executed anything yet.
    #[default]
    Unsuccessful
}

/// Configuration flags for [`Simulator`].
///
/// These are preserved by [`Simulator::reset`],
/// and take effect on the next [`Simulator::new`] or [`Simulator::reset`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The creation strategy for the initial register values.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`] (every register is zero).
    pub machine_init: MachineInitStrategy,

    /// The number of words the stack can hold.
    ///
    /// By default, this flag is [`STACK_CAPACITY`].
    pub stack_capacity: usize,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            machine_init: Default::default(),
            stack_capacity: STACK_CAPACITY,
        }
    }
}

/// Executes assembled code.
#[derive(Debug, Clone)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    pub mem: Mem,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u32,

    /// The stack used by `push` and `pop`.
    pub stack: Stack,

    /// The flag written by `bsr` and `bsf` and read by `jne`.
    pub flag: bool,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This includes `halt`.
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution had paused.
    pause_condition: PauseCondition,

    // ------------------ CONFIG STATE ------------------

    /// Configuration settings for the simulator.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,
}

impl Simulator {
    /// Creates a new simulator with the provided flags, but without a loaded object file.
    pub fn new(flags: SimFlags) -> Self {
        let mut filler = flags.machine_init.generator();

        Self {
            mem: Mem::new(),
            reg_file: RegFile::new(&mut filler),
            pc: 0,
            stack: Stack::new(flags.stack_capacity),
            flag: false,
            instructions_run: 0,
            pause_condition: Default::default(),
            flags,
        }
    }

    /// Resets the simulator.
    ///
    /// This resets the state of the `Simulator` back to before any execution calls,
    /// while preserving its flags.
    ///
    /// This also clears memory. Any object file data has to be reloaded into the Simulator.
    pub fn reset(&mut self) {
        *self = Simulator::new(self.flags);
    }

    /// Loads an object file into this simulator.
    ///
    /// Memory is replaced with the object file's words and the PC is set to 0.
    pub fn load_obj_file(&mut self, obj: &ObjectFile) -> Result<(), SimErr> {
        if obj.len() > MAX_WORDS {
            return Err(SimErr::ProgramTooLarge(obj.len()));
        }

        self.mem.load(obj.words());
        self.pc = 0;
        tracing::debug!(words = obj.len(), "loaded object file");
        Ok(())
    }

    /// Sets the PC to the provided address, checking it can hold an instruction address.
    fn set_pc(&mut self, addr: i64) -> Result<(), SimErr> {
        self.pc = u32::try_from(addr)
            .ok()
            .filter(|&pc| (pc as usize) < MAX_WORDS)
            .ok_or(SimErr::PcOutOfBounds(addr))?;
        Ok(())
    }

    /// Moves the PC to the next instruction or jumps by the offset (relative to the next instruction).
    fn branch(&mut self, taken: bool, off: i32) -> Result<(), SimErr> {
        let next = i64::from(self.pc) + 1;
        match taken {
            true  => self.set_pc(next + i64::from(off)),
            false => self.set_pc(next),
        }
    }

    /// Stores the result of a bit scan.
    ///
    /// A zero operand has no set bit, which stores -1 and clears the flag.
    fn set_scan(&mut self, dr: Reg, operand: i32, index: u32) {
        match operand {
            0 => {
                self.reg_file[dr] = -1;
                self.flag = false;
            },
            _ => {
                // index is at most 31
                self.reg_file[dr] = index as i32;
                self.flag = true;
            }
        }
    }

    /// Checks whether the last execution hit a halt instruction.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Halt)
    }

    /// Runs until the tripwire condition returns false (or a halt occurs).
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        std::mem::take(&mut self.pause_condition);

        // event loop
        // run until:
        // 1. the tripwire condition returns false
        // 2. a halt is executed
        let result = loop {
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            match self.step() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::Err(e)) => break Err(e)
            }
        };

        self.pause_condition = result?;
        Ok(())
    }

    /// Execute the program.
    ///
    /// This blocks until the program halts.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program halts or until the number of steps to execute has been hit.
    /// Use [`Simulator::hit_halt`] to tell the two apart.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Simulate one step, executing one instruction.
    ///
    /// Errors leave the PC at the instruction which raised them.
    fn step(&mut self) -> Result<(), StepBreak> {
        let word = self.mem.get(self.pc)
            .ok_or(SimErr::PcOutOfBounds(i64::from(self.pc)))?;
        let instr = SimInstr::decode(word)?;
        tracing::trace!(pc = self.pc, ?instr, "executing");

        match instr {
            SimInstr::ADD(a, b, c) => {
                self.reg_file[c] = self.reg_file[a].wrapping_add(self.reg_file[b]);
                self.branch(false, 0)?;
            },
            SimInstr::NAND(a, b, c) => {
                self.reg_file[c] = !(self.reg_file[a] & self.reg_file[b]);
                self.branch(false, 0)?;
            },
            SimInstr::LW(a, b, off) => {
                let ea = self.reg_file[a].wrapping_add(off.get());
                self.reg_file[b] = self.mem.read(ea)?;
                self.branch(false, 0)?;
            },
            SimInstr::SW(a, b, off) => {
                let ea = self.reg_file[a].wrapping_add(off.get());
                self.mem.write(ea, self.reg_file[b])?;
                self.branch(false, 0)?;
            },
            SimInstr::BEQ(a, b, off) => {
                let taken = self.reg_file[a] == self.reg_file[b];
                self.branch(taken, off.get())?;
            },
            SimInstr::JARL(a, b) => {
                let link = i64::from(self.pc) + 1;
                if self.reg_file[a] == self.reg_file[b] {
                    self.set_pc(link)?;
                    self.reg_file[a] = link as i32;
                } else {
                    let target = i64::from(self.reg_file[a]);
                    self.set_pc(target)?;
                    self.reg_file[b] = link as i32;
                }
            },
            SimInstr::HALT => {
                self.instructions_run = self.instructions_run.wrapping_add(1);
                return Err(StepBreak::Halt);
            },
            SimInstr::MUL(a, b, c) => {
                let product = u64::from(self.reg_file[a] as u32) * u64::from(self.reg_file[b] as u32);
                self.reg_file[c] = product as u32 as i32;
                self.branch(false, 0)?;
            },
            SimInstr::DIV(a, b, c) => {
                let dividend = self.reg_file[a] as u32;
                let divisor = self.reg_file[b] as u32;
                let quotient = dividend.checked_div(divisor).ok_or(SimErr::DivideByZero)?;
                self.reg_file[c] = quotient as i32;
                self.branch(false, 0)?;
            },
            SimInstr::IMUL(a, b, c) => {
                self.reg_file[c] = self.reg_file[a].wrapping_mul(self.reg_file[b]);
                self.branch(false, 0)?;
            },
            SimInstr::XIDIV(a, b, c) => {
                let divisor = self.reg_file[b];
                if divisor == 0 {
                    return Err(SimErr::DivideByZero.into());
                }
                self.reg_file[c] = self.reg_file[a].wrapping_div(divisor);

                let (va, vb) = (self.reg_file[a], self.reg_file[b]);
                self.reg_file[a] = vb;
                self.reg_file[b] = va;
                self.branch(false, 0)?;
            },
            SimInstr::AND(a, b, c) => {
                self.reg_file[c] = self.reg_file[a] & self.reg_file[b];
                self.branch(false, 0)?;
            },
            SimInstr::XOR(a, b, c) => {
                self.reg_file[c] = self.reg_file[a] ^ self.reg_file[b];
                self.branch(false, 0)?;
            },
            SimInstr::CMPGE(a, b, c) => {
                self.reg_file[c] = i32::from(self.reg_file[a] >= self.reg_file[b]);
                self.branch(false, 0)?;
            },
            SimInstr::JMAE(a, b, off) => {
                let taken = self.reg_file[a] >= self.reg_file[b];
                self.branch(taken, off.get())?;
            },
            SimInstr::JMNAE(a, b, off) => {
                let taken = self.reg_file[a] < self.reg_file[b];
                self.branch(taken, off.get())?;
            },
            SimInstr::BSR(a, b) => {
                let val = self.reg_file[a];
                self.set_scan(b, val, val.leading_zeros());
                self.branch(false, 0)?;
            },
            SimInstr::BSF(a, b) => {
                let val = self.reg_file[a];
                self.set_scan(b, val, val.trailing_zeros());
                self.branch(false, 0)?;
            },
            SimInstr::JNE(off) => {
                self.branch(self.flag, off.get())?;
            },
            SimInstr::POP(r) => {
                self.reg_file[r] = self.stack.pop()?;
                self.branch(false, 0)?;
            },
            SimInstr::PUSH(r) => {
                self.stack.push(self.reg_file[r])?;
                self.branch(false, 0)?;
            },
        }

        self.instructions_run = self.instructions_run.wrapping_add(1);
        Ok(())
    }

    /// Simulate one step, executing one instruction.
    ///
    /// If the instruction was a halt, [`Simulator::hit_halt`] reports it
    /// and the PC stays at the halt.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        std::mem::take(&mut self.pause_condition);
        match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt) => {
                self.pause_condition = PauseCondition::Halt;
                Ok(())
            },
            Err(StepBreak::Err(e)) => Err(e)
        }
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble, ObjectFile};
    use crate::ast::reg_consts::{R0, R1, R2, R3, R4};
    use crate::ast::Reg;

    use super::mem::MachineInitStrategy;
    use super::{SimErr, SimFlags, Simulator};

    /// Assembles the source and loads it into a fresh simulator.
    fn load_src(src: &str) -> Simulator {
        let obj = assemble(src).unwrap();
        let mut sim = Simulator::default();
        sim.load_obj_file(&obj).unwrap();
        sim
    }

    /// Loads the source, sets the registers, and runs to a halt.
    fn run_src(src: &str, regs: &[(Reg, i32)]) -> Simulator {
        let mut sim = load_src(src);
        for &(r, v) in regs {
            sim.reg_file[r] = v;
        }
        sim.run_with_limit(1000).unwrap();
        assert!(sim.hit_halt(), "program did not halt");
        sim
    }

    fn assert_sim_fail(src: &str, regs: &[(Reg, i32)], err: SimErr) {
        let mut sim = load_src(src);
        for &(r, v) in regs {
            sim.reg_file[r] = v;
        }
        assert_eq!(sim.run_with_limit(1000), Err(err));
        assert!(!sim.hit_halt());
    }

    #[test]
    fn test_add_halt() {
        let sim = run_src("L add 0 1 2\n  halt", &[(R0, 3), (R1, 4)]);
        assert_eq!(sim.reg_file[R2], 7);
        assert_eq!(sim.instructions_run, 2);
        assert_eq!(sim.pc, 1);
    }

    #[test]
    fn test_arith() {
        let src = "
    add 0 1 2
    nand 0 1 3
    and 0 1 4
    halt
";
        let sim = run_src(src, &[(R0, i32::MAX), (R1, 0b1100)]);
        assert_eq!(sim.reg_file[R2], i32::MIN + 11);
        assert_eq!(sim.reg_file[R3], !0b1100);
        assert_eq!(sim.reg_file[R4], 0b1100);

        let sim = run_src("  xor 0 1 2\n  cmpge 0 1 3\n  cmpge 1 0 4\n  halt", &[(R0, -5), (R1, 3)]);
        assert_eq!(sim.reg_file[R2], -5 ^ 3);
        assert_eq!(sim.reg_file[R3], 0);
        assert_eq!(sim.reg_file[R4], 1);
    }

    #[test]
    fn test_mul_div() {
        // unsigned multiply keeps the low 32 bits
        let sim = run_src("  mul 0 1 2\n  halt", &[(R0, 0x10000), (R1, 0x10001)]);
        assert_eq!(sim.reg_file[R2], 0x10000);

        let sim = run_src("  mul 0 1 2\n  imul 0 1 3\n  halt", &[(R0, -1), (R1, 2)]);
        assert_eq!(sim.reg_file[R2], -2);
        assert_eq!(sim.reg_file[R3], -2);

        // -2 is 0xFFFFFFFE unsigned
        let sim = run_src("  div 0 1 2\n  halt", &[(R0, -2), (R1, 2)]);
        assert_eq!(sim.reg_file[R2], 0x7FFFFFFF);
    }

    #[test]
    fn test_xidiv() {
        let sim = run_src("  xidiv 0 1 2\n  halt", &[(R0, -7), (R1, 2)]);
        assert_eq!(sim.reg_file[R2], -3);
        assert_eq!(sim.reg_file[R0], 2);
        assert_eq!(sim.reg_file[R1], -7);

        let sim = run_src("  xidiv 0 1 2\n  halt", &[(R0, i32::MIN), (R1, -1)]);
        assert_eq!(sim.reg_file[R2], i32::MIN);
    }

    #[test]
    fn test_divide_by_zero() {
        assert_sim_fail("  div 0 1 2\n  halt", &[(R0, 5)], SimErr::DivideByZero);
        assert_sim_fail("  xidiv 0 1 2\n  halt", &[(R0, 5)], SimErr::DivideByZero);
    }

    #[test]
    fn test_bit_scan() {
        let mut sim = run_src("  bsr 0 1\n  halt", &[(R0, 8)]);
        assert_eq!(sim.reg_file[R1], 28);
        assert!(sim.flag);

        sim = run_src("  bsf 0 1\n  halt", &[(R0, 8)]);
        assert_eq!(sim.reg_file[R1], 3);
        assert!(sim.flag);

        sim = run_src("  bsr 0 1\n  halt", &[(R0, -1)]);
        assert_eq!(sim.reg_file[R1], 0);
        assert!(sim.flag);

        // zero clears the flag, even if it was set before
        sim = run_src("  bsf 2 3\n  bsr 0 1\n  halt", &[(R2, 1)]);
        assert_eq!(sim.reg_file[R3], 0);
        assert_eq!(sim.reg_file[R1], -1);
        assert!(!sim.flag);

        sim = run_src("  bsf 0 1\n  halt", &[]);
        assert_eq!(sim.reg_file[R1], -1);
        assert!(!sim.flag);
    }

    #[test]
    fn test_branches() {
        let src = "
    beq 0 1 SKIP
    add 2 2 2
SKIP halt
";
        // not taken: the add doubles r2
        let sim = run_src(src, &[(R1, 1), (R2, 5)]);
        assert_eq!(sim.reg_file[R2], 10);
        assert_eq!(sim.instructions_run, 3);

        // taken: jumps straight to the label
        let sim = run_src(src, &[(R2, 5)]);
        assert_eq!(sim.reg_file[R2], 5);
        assert_eq!(sim.pc, 2);
        assert_eq!(sim.instructions_run, 2);

        let src = "
    jmae 0 1 A
    halt
A   jmnae 0 1 B
    add 2 2 2
B   halt
";
        let sim = run_src(src, &[(R0, 3), (R1, 3), (R2, 1)]);
        assert_eq!(sim.reg_file[R2], 2);
        assert_eq!(sim.pc, 4);

        let sim = run_src(src, &[(R0, -1), (R1, 3)]);
        assert_eq!(sim.pc, 1);
    }

    #[test]
    fn test_loop() {
        // count r0 down to zero, accumulating r1 += 2 each round
        // r6 stays zero as the base register of the load
        let src = "
    lw 6 3 NEG
LOOP beq 0 2 END
    add 1 4 1
    add 0 3 0
    beq 2 2 LOOP
END halt
NEG .fill -1
";
        let sim = run_src(src, &[(R0, 5), (R4, 2)]);
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.reg_file[R1], 10);
        assert_eq!(sim.pc, 5);
    }

    #[test]
    fn test_jne() {
        let src = "
    bsr 0 1
    jne DONE
    add 2 2 2
DONE halt
";
        let sim = run_src(src, &[(R0, 1), (R2, 1)]);
        assert_eq!(sim.reg_file[R2], 1);

        let sim = run_src(src, &[(R2, 1)]);
        assert_eq!(sim.reg_file[R2], 2);
    }

    #[test]
    fn test_jarl() {
        // equal: links the next address and falls through
        let sim = run_src("  jarl 0 1\n  halt", &[]);
        assert_eq!(sim.reg_file[R0], 1);
        assert_eq!(sim.pc, 1);

        // not equal: jumps to r0, links into r1
        let src = "
    jarl 0 1
    halt
    halt
    add 2 2 2
    halt
";
        let sim = run_src(src, &[(R0, 3), (R1, 7), (R2, 4)]);
        assert_eq!(sim.reg_file[R1], 1);
        assert_eq!(sim.reg_file[R2], 8);
        assert_eq!(sim.pc, 4);

        assert_sim_fail("  jarl 0 1\n  halt", &[(R0, -2)], SimErr::PcOutOfBounds(-2));
    }

    #[test]
    fn test_memory() {
        let src = "
    lw 0 1 VAL
    sw 0 1 20
    lw 0 2 20
    halt
VAL .fill 99
";
        let sim = run_src(src, &[]);
        assert_eq!(sim.reg_file[R1], 99);
        assert_eq!(sim.reg_file[R2], 99);
        assert_eq!(sim.mem.len(), 21);
        assert_eq!(sim.mem.get(20), Some(99));
        assert_eq!(sim.mem.get(19), Some(0));

        assert_sim_fail("  lw 0 1 -1\n  halt", &[], SimErr::AccessViolation(-1));
        assert_sim_fail("  sw 0 1 0\n  halt", &[(R0, 16384)], SimErr::AccessViolation(16384));
    }

    #[test]
    fn test_stack() {
        let src = "
    push
    push 2
    pop 3
    pop
    halt
";
        let sim = run_src(src, &[(R1, 10), (R2, 20)]);
        assert_eq!(sim.reg_file[R3], 20);
        assert_eq!(sim.reg_file[R1], 10);
        assert!(sim.stack.is_empty());

        let mut sim = load_src("  push\n  halt");
        for _ in 0..32 {
            sim.stack.push(0).unwrap();
        }
        assert_eq!(sim.run(), Err(SimErr::StackOverflow));
        assert_eq!(sim.pc, 0);

        // pop on an empty stack can only happen at runtime through a jump
        let mut sim = Simulator::default();
        sim.load_obj_file(&ObjectFile::from_words(vec![19 << 23, 6 << 23])).unwrap();
        assert_eq!(sim.run(), Err(SimErr::StackUnderflow));
    }

    #[test]
    fn test_fatal_fetch() {
        // no halt: runs off the end
        assert_sim_fail("  add 0 0 0", &[], SimErr::PcOutOfBounds(1));

        // a data word is not an instruction
        let mut sim = Simulator::default();
        sim.load_obj_file(&ObjectFile::from_words(vec![-1])).unwrap();
        assert_eq!(sim.step_in(), Err(SimErr::IllegalOpcode(31)));
        assert_eq!(sim.pc, 0);
        assert_eq!(sim.instructions_run, 0);
    }

    #[test]
    fn test_run_with_limit() {
        let mut sim = load_src("L beq 0 0 L");
        sim.run_with_limit(50).unwrap();
        assert!(!sim.hit_halt());
        assert_eq!(sim.instructions_run, 50);
        assert_eq!(sim.pc, 0);
    }

    #[test]
    fn test_reset_and_flags() {
        let flags = SimFlags {
            machine_init: MachineInitStrategy::Known { value: 7 },
            stack_capacity: 1,
        };
        let mut sim = Simulator::new(flags);
        assert_eq!(sim.reg_file[R4], 7);

        sim.load_obj_file(&assemble("  push\n  push\n  halt").unwrap()).unwrap();
        assert_eq!(sim.run(), Err(SimErr::StackOverflow));

        sim.reset();
        assert!(sim.mem.is_empty());
        assert!(sim.stack.is_empty());
        assert_eq!(sim.pc, 0);
        assert_eq!(sim.instructions_run, 0);
        assert_eq!(sim.flags, flags);
    }
}
