//! `ssol`: runs a SOL machine code file and writes its execution trace.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sol_ensemble::asm::encoding::{ObjFileFormat, TextFormat};
use sol_ensemble::cli::{init_logging, path_with_ext, Verbosity};
use sol_ensemble::err::Error as _;
use sol_ensemble::output::OutputFile;
use sol_ensemble::sim::mem::MachineInitStrategy;
use sol_ensemble::sim::trace::{TraceErr, Tracer};
use sol_ensemble::sim::{SimFlags, Simulator};

/// Simulates SOL machine code, tracing the machine state after every instruction.
#[derive(Parser, Debug)]
#[command(name = "ssol", version, about, long_about = None)]
struct Args {
    /// The machine code file
    #[arg(value_name = "INPUT.mc", value_parser = path_with_ext("mc"))]
    input: PathBuf,

    /// Where to write the trace
    #[arg(value_name = "OUTPUT.txt", value_parser = path_with_ext("txt"))]
    output: PathBuf,

    /// Fail if the program has not halted after this many instructions
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Start registers at random values from this seed
    #[arg(long, value_name = "S", conflicts_with = "random_init")]
    seed: Option<u64>,

    /// Start registers at unseeded random values
    #[arg(long)]
    random_init: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}
impl Args {
    fn flags(&self) -> SimFlags {
        let machine_init = match (self.seed, self.random_init) {
            (Some(seed), _) => MachineInitStrategy::Seeded { seed },
            (None, true)    => MachineInitStrategy::Unseeded,
            (None, false)   => MachineInitStrategy::default(),
        };

        SimFlags { machine_init, ..Default::default() }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read {}", args.input.display()))?;
    let obj = TextFormat::deserialize(&text)
        .with_context(|| format!("could not load {}", args.input.display()))?;

    let mut sim = Simulator::new(args.flags());
    sim.load_obj_file(&obj)?;

    let out = OutputFile::create(&args.output)
        .with_context(|| format!("could not create {}", args.output.display()))?;
    let mut tracer = Tracer::new(out);

    match tracer.run(&mut sim, args.max_steps) {
        Ok(n) => {
            tracer.into_inner()
                .commit()
                .with_context(|| format!("could not write {}", args.output.display()))?;
            tracing::info!("machine halted after {n} instructions, trace written to {}", args.output.display());
            Ok(())
        },
        // dropping the tracer here discards the partial trace
        Err(e) => Err(e).with_context(|| format!("simulation failed at pc {}", sim.pc)),
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.use_stderr() {
                true  => ExitCode::FAILURE,
                false => ExitCode::SUCCESS,
            };
        }
    };
    init_logging(args.verbosity);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(help) = e.downcast_ref::<TraceErr>().and_then(|t| t.help()) {
                eprintln!("  = help: {help}");
            }
            ExitCode::FAILURE
        }
    }
}
