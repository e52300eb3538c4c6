//! `asol`: assembles a SOL source file into a machine code file.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sol_ensemble::asm::assemble;
use sol_ensemble::asm::encoding::{ObjFileFormat, TextFormat};
use sol_ensemble::cli::{format_asm_errs, init_logging, path_with_ext, Verbosity};
use sol_ensemble::output::OutputFile;

/// Assembles SOL source code into one decimal machine word per line.
#[derive(Parser, Debug)]
#[command(name = "asol", version, about, long_about = None)]
struct Args {
    /// The assembly source file
    #[arg(value_name = "INPUT.as", value_parser = path_with_ext("as"))]
    input: PathBuf,

    /// Where to write the machine code
    #[arg(value_name = "OUTPUT.mc", value_parser = path_with_ext("mc"))]
    output: PathBuf,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let src = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read {}", args.input.display()))?;

    let obj = match assemble(&src) {
        Ok(obj) => obj,
        Err(errs) => {
            let filename = args.input.display().to_string();
            eprint!("{}", format_asm_errs(&errs, &src, &filename));
            anyhow::bail!("could not assemble {filename} due to {} error(s)", errs.len());
        }
    };
    tracing::debug!(words = obj.len(), "assembled");

    let mut out = OutputFile::create(&args.output)
        .with_context(|| format!("could not create {}", args.output.display()))?;
    out.write_all(TextFormat::serialize(&obj).as_bytes())
        .and_then(|()| out.commit())
        .with_context(|| format!("could not write {}", args.output.display()))?;

    tracing::info!("assembled {} words into {}", obj.len(), args.output.display());
    Ok(())
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
            ExitCode::FAILURE
        }
    }
}
