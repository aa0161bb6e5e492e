use anyhow::{bail, Context as _};
use std::fs;

use spv_lint::lint::{Diagnostic, Linter, Severity};

/// Lint a SPIR-V module for derivatives under non-uniform control flow.
#[derive(argh::FromArgs, Debug)]
struct Args {
    /// show version
    #[argh(switch)]
    version: bool,

    /// the SPIR-V binary to lint.
    #[argh(positional)]
    input: Option<String>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let prefix = match diagnostic.severity {
        Severity::Fatal | Severity::InternalError | Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Debug => "debug",
    };
    eprintln!("{prefix}: {}", diagnostic.message);
    if !diagnostic.instruction.is_empty() {
        eprintln!("  {}", diagnostic.instruction);
    }
}

fn run() -> anyhow::Result<()> {
    env_logger::init();

    let args: Args = argh::from_env();
    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let input = match args.input {
        Some(input) => input,
        None => bail!("expected exactly one argument: the input file"),
    };

    let bytes = fs::read(&input).with_context(|| format!("reading `{input}`"))?;
    let words = words_from_bytes(&bytes)?;

    let mut linter = Linter::new(|diagnostic| print_diagnostic(&diagnostic));
    if !linter.run(&words) {
        // The decode failure was already reported through the consumer.
        std::process::exit(1);
    }
    Ok(())
}

fn words_from_bytes(bytes: &[u8]) -> anyhow::Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        bail!(
            "input size {} is not a multiple of the SPIR-V word size",
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
