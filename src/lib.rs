//! A SOL parser, assembler, and simulator.
//!
//! SOL is a small 32-bit instruction set with 16 registers, a bounded
//! stack and a single flag. This crate holds both halves of its toolchain:
//! the assembler that turns source text into machine words, and the simulator
//! which executes those words and traces every step.
//!
//! # Usage
//!
//! To convert SOL source code to an object file, it must be assembled:
//! ```
//! use sol_ensemble::asm::{assemble, assemble_debug, ObjectFile};
//!
//! let code = "L add 0 1 2\n halt";
//!
//! // Assemble source into object file:
//! let obj_file: ObjectFile = assemble(code).unwrap();
//! assert_eq!(obj_file.words(), &[32770, 50331648]);
//!
//! // OR, keeping the symbol table around:
//! let obj_file: ObjectFile = assemble_debug(code).unwrap();
//! assert_eq!(obj_file.symbol_table().unwrap().lookup_label("L"), Some(0));
//! ```
//!
//! Once an object file has been created, it can be executed with the simulator:
//! ```
//! # use sol_ensemble::asm::assemble;
//! # let obj_file = assemble("L add 0 1 2\n halt").unwrap();
//! use sol_ensemble::ast::reg_consts::{R0, R1, R2};
//! use sol_ensemble::sim::Simulator;
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_obj_file(&obj_file).unwrap();
//! simulator.reg_file[R0] = 3;
//! simulator.reg_file[R1] = 4;
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//!
//! assert!(simulator.hit_halt());
//! assert_eq!(simulator.reg_file[R2], 7);
//! assert_eq!(simulator.instructions_run, 2);
//! ```
//!
//! To record an execution trace, see [`sim::trace`].
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
pub mod output;
pub mod cli;
