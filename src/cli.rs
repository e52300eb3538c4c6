//! Shared plumbing for the `asol` and `ssol` binaries.
//!
//! This holds the pieces both tools need:
//! - [`Verbosity`] and [`init_logging`]: `-v`/`-q` flags and the `tracing` subscriber,
//! - [`path_with_ext`]: a `clap` value parser that checks file extensions,
//! - [`format_asm_errs`]: rendering assembler diagnostics with line and column numbers.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::asm::{AsmErrs, SourceInfo};
use crate::err::Error as _;

/// Log verbosity flags.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
pub struct Verbosity {
    /// Log more (`-v` for debug output, `-vv` for every executed instruction)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
impl Verbosity {
    /// The default log filter these flags select.
    pub fn level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

/// Installs a `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` takes priority over the verbosity flags.
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.level()));

    // a subscriber may already be installed (e.g., by a test harness)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Creates a `clap` value parser which accepts paths ending with `.{ext}`.
///
/// # Example
/// ```
/// use sol_ensemble::cli::path_with_ext;
///
/// let parse = path_with_ext("as");
/// assert!(parse("prog.as").is_ok());
/// assert!(parse("prog.mc").is_err());
/// assert!(parse("as").is_err());
/// ```
pub fn path_with_ext(ext: &'static str) -> impl Fn(&str) -> Result<PathBuf, String> + Clone + Send + Sync + 'static {
    move |s: &str| {
        let path = PathBuf::from(s);
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e == ext => Ok(path),
            _ => Err(format!("expected a file ending with .{ext}")),
        }
    }
}

/// Renders every assembler error as `file:line:col: message`, with help lines where available.
///
/// Line and column numbers are one-indexed.
///
/// # Example
/// ```
/// use sol_ensemble::asm::assemble;
/// use sol_ensemble::cli::format_asm_errs;
///
/// let src = "  halt\n  add 0 1 99";
/// let errs = assemble(src).unwrap_err();
/// let report = format_asm_errs(&errs, src, "prog.as");
/// assert!(report.starts_with("error: prog.as:2:11: "));
/// ```
pub fn format_asm_errs(errs: &AsmErrs, src: &str, filename: &str) -> String {
    let info = SourceInfo::new(src);

    let mut out = String::new();
    for err in errs {
        let (lno, cno) = info.get_pos_pair(err.span.first().start);
        out.push_str(&format!("error: {filename}:{}:{}: {err}\n", lno + 1, cno + 1));

        if let Some(line) = info.read_line(lno) {
            out.push_str(&format!("  | {}\n", line.trim_end()));
        }
        if let Some(help) = err.help() {
            out.push_str(&format!("  = help: {help}\n"));
        }
    }
    out
}
