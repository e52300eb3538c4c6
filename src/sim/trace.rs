//! Writing the execution trace of a simulated program.
//!
//! A trace consists of:
//! - a dump of memory as it was loaded,
//! - a state block for the initial machine state and after every executed instruction,
//! - a halt banner with the number of instructions executed, followed by the final state.
//!
//! ```text
//! memory[ 0 ] = 32770
//! memory[ 1 ] = 50331648
//!
//!
//! @@@
//! state:
//!     pc 0
//!     memory:
//!         mem[ 0 ] 32770
//!         mem[ 1 ] 50331648
//!     registers:
//!         reg[ 0 ] 0
//!         ...
//!     stack:
//!     flag: false
//! end state
//! ```
//!
//! Indentation in the trace is done with tab characters.

use std::io::Write;

use crate::err::Error as _;

use super::{SimErr, Simulator};

/// Errors raised while tracing a simulation.
#[derive(Debug)]
pub enum TraceErr {
    /// The simulated program raised an error.
    Sim(SimErr),
    /// The trace could not be written.
    Io(std::io::Error),
    /// The program did not halt within the given number of steps.
    StepLimit(u64),
}
impl std::fmt::Display for TraceErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceErr::Sim(e) => write!(f, "{e}"),
            TraceErr::Io(e)  => write!(f, "could not write trace: {e}"),
            TraceErr::StepLimit(n) => write!(f, "program did not halt within {n} steps"),
        }
    }
}
impl std::error::Error for TraceErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceErr::Sim(e) => Some(e),
            TraceErr::Io(e)  => Some(e),
            TraceErr::StepLimit(_) => None,
        }
    }
}
impl crate::err::Error for TraceErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            TraceErr::Sim(e) => e.help(),
            TraceErr::Io(_)  => None,
            TraceErr::StepLimit(_) => Some("the program may be stuck in a loop; raise the step limit if it is not".into()),
        }
    }
}
impl From<SimErr> for TraceErr {
    fn from(value: SimErr) -> Self {
        TraceErr::Sim(value)
    }
}
impl From<std::io::Error> for TraceErr {
    fn from(value: std::io::Error) -> Self {
        TraceErr::Io(value)
    }
}

/// Runs a [`Simulator`], writing its trace into a writer.
///
/// # Example
/// ```
/// use sol_ensemble::asm::assemble;
/// use sol_ensemble::sim::Simulator;
/// use sol_ensemble::sim::trace::Tracer;
///
/// let obj = assemble("  halt").unwrap();
/// let mut sim = Simulator::default();
/// sim.load_obj_file(&obj).unwrap();
///
/// let mut tracer = Tracer::new(vec![]);
/// assert_eq!(tracer.run(&mut sim, None).unwrap(), 1);
///
/// let out = String::from_utf8(tracer.into_inner()).unwrap();
/// assert!(out.starts_with("memory[ 0 ] = 50331648\n"));
/// assert!(out.contains("machine halted\ntotal of 1 instructions executed\n"));
/// ```
#[derive(Debug)]
pub struct Tracer<W: Write> {
    out: W
}
impl<W: Write> Tracer<W> {
    /// Creates a tracer which writes into the given writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Gets the writer back.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes every word currently in memory.
    pub fn write_memory(&mut self, sim: &Simulator) -> std::io::Result<()> {
        for (i, word) in sim.mem.as_slice().iter().enumerate() {
            writeln!(self.out, "memory[ {i} ] = {word}")?;
        }
        writeln!(self.out)?;
        writeln!(self.out)
    }

    /// Writes a state block for the simulator, reporting the given PC.
    ///
    /// The block ends at `end state` without a newline.
    fn write_block(&mut self, sim: &Simulator, pc: u64) -> std::io::Result<()> {
        writeln!(self.out, "@@@")?;
        writeln!(self.out, "state:")?;
        writeln!(self.out, "\tpc {pc}")?;
        writeln!(self.out, "\tmemory:")?;
        for (i, word) in sim.mem.as_slice().iter().enumerate() {
            writeln!(self.out, "\t\tmem[ {i} ] {word}")?;
        }
        writeln!(self.out, "\tregisters:")?;
        for (i, word) in sim.reg_file.as_slice().iter().enumerate() {
            writeln!(self.out, "\t\treg[ {i} ] {word}")?;
        }
        writeln!(self.out, "\tstack:")?;
        for (i, word) in sim.stack.iter().enumerate() {
            writeln!(self.out, "\t\tst[ {i} ] {word}")?;
        }
        writeln!(self.out, "\tflag: {}", sim.flag)?;
        write!(self.out, "end state")
    }

    /// Writes the current machine state.
    pub fn write_state(&mut self, sim: &Simulator) -> std::io::Result<()> {
        self.write_block(sim, u64::from(sim.pc))?;
        writeln!(self.out)?;
        writeln!(self.out)
    }

    /// Writes the state of a halted machine, the halt banner, and the final state.
    ///
    /// The final state reports the PC after the halt.
    pub fn write_halt(&mut self, sim: &Simulator) -> std::io::Result<()> {
        self.write_block(sim, u64::from(sim.pc))?;
        writeln!(self.out)?;
        writeln!(self.out, "machine halted")?;
        writeln!(self.out, "total of {} instructions executed", sim.instructions_run)?;
        writeln!(self.out, "final state of machine:")?;
        writeln!(self.out)?;
        self.write_block(sim, u64::from(sim.pc) + 1)?;
        writeln!(self.out)?;
        writeln!(self.out)
    }

    /// Runs the simulator until it halts, writing the whole trace.
    ///
    /// If `limit` is set, the run fails once that many instructions
    /// were executed without a halt.
    ///
    /// This returns the number of instructions executed (including the halt).
    pub fn run(&mut self, sim: &mut Simulator, limit: Option<u64>) -> Result<u64, TraceErr> {
        self.write_memory(sim)?;
        self.write_state(sim)?;

        let start = sim.instructions_run;
        loop {
            if let Some(max) = limit {
                if sim.instructions_run.wrapping_sub(start) >= max {
                    return Err(TraceErr::StepLimit(max));
                }
            }

            sim.step_in()?;
            if sim.hit_halt() {
                self.write_halt(sim)?;
                self.out.flush()?;
                tracing::debug!(instructions = sim.instructions_run, "machine halted");
                return Ok(sim.instructions_run);
            }
            self.write_state(sim)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble, ObjectFile};
    use crate::ast::reg_consts::{R0, R1};
    use crate::sim::{SimErr, SimFlags, Simulator};

    use super::{TraceErr, Tracer};

    fn trace(sim: &mut Simulator, limit: Option<u64>) -> (Result<u64, TraceErr>, String) {
        let mut tracer = Tracer::new(vec![]);
        let result = tracer.run(sim, limit);
        let out = String::from_utf8(tracer.into_inner()).unwrap();
        (result, out)
    }

    fn regs_block(values: [i32; 16]) -> String {
        values.iter()
            .enumerate()
            .map(|(i, v)| format!("\t\treg[ {i} ] {v}\n"))
            .collect()
    }

    #[test]
    fn test_halt_only() {
        let mut sim = Simulator::default();
        sim.load_obj_file(&assemble("  halt").unwrap()).unwrap();
        let (result, out) = trace(&mut sim, None);
        assert_eq!(result.unwrap(), 1);

        let regs = regs_block([0; 16]);
        let block = |pc: u32| format!(
            "@@@\nstate:\n\tpc {pc}\n\tmemory:\n\t\tmem[ 0 ] 50331648\n\tregisters:\n{regs}\tstack:\n\tflag: false\nend state"
        );
        let expected = format!(
            "memory[ 0 ] = 50331648\n\n\n{}\n\n{}\nmachine halted\ntotal of 1 instructions executed\nfinal state of machine:\n\n{}\n\n",
            block(0), block(0), block(1)
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_state_per_step() {
        let mut sim = Simulator::default();
        sim.load_obj_file(&assemble("L add 0 1 2\n  push 2\n  halt").unwrap()).unwrap();
        sim.reg_file[R0] = 3;
        sim.reg_file[R1] = 4;

        let (result, out) = trace(&mut sim, None);
        assert_eq!(result.unwrap(), 3);

        // initial, after add, after push, at halt, final
        assert_eq!(out.matches("@@@\n").count(), 5);
        assert_eq!(out.matches("\tpc 2\n").count(), 2);
        assert_eq!(out.matches("\tpc 3\n").count(), 1);
        assert!(out.contains("\t\treg[ 2 ] 7\n"));
        assert!(out.contains("\tstack:\n\t\tst[ 0 ] 7\n\tflag: false\n"));
        assert!(out.ends_with("end state\n\n"));
    }

    #[test]
    fn test_stack_order() {
        let mut sim = Simulator::default();
        sim.load_obj_file(&assemble("  push 0\n  push 1\n  halt").unwrap()).unwrap();
        sim.reg_file[R0] = 10;
        sim.reg_file[R1] = 20;

        let (result, out) = trace(&mut sim, None);
        result.unwrap();
        assert!(out.contains("\tstack:\n\t\tst[ 0 ] 20\n\t\tst[ 1 ] 10\n"));
    }

    #[test]
    fn test_failure() {
        let mut sim = Simulator::default();
        sim.load_obj_file(&ObjectFile::from_words(vec![0, -1])).unwrap();
        let (result, out) = trace(&mut sim, None);
        assert!(matches!(result, Err(TraceErr::Sim(SimErr::IllegalOpcode(31)))));
        assert!(!out.contains("machine halted"));

        let mut sim = Simulator::new(SimFlags::default());
        sim.load_obj_file(&assemble("L beq 0 0 L").unwrap()).unwrap();
        let (result, out) = trace(&mut sim, Some(10));
        assert!(matches!(result, Err(TraceErr::StepLimit(10))));
        assert_eq!(out.matches("@@@\n").count(), 11);
    }
}
