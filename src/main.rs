use std::path::PathBuf;
use std::{env, io::IsTerminal};

use clap::Parser;

use a65_core::{Assembler, Assembly, render_diagnostic, write_listing, write_object};

#[derive(Debug, Parser)]
#[command(
    name = "a65",
    about = "Two-pass assembler for the MOS 6502",
    long_about = None,
    override_usage = "a65 [-L] [-l listing-file] [-o object-file] [-v] source-file"
)]
struct Cli {
    /// Write a listing file (default name: source base + .lst).
    #[arg(short = 'L')]
    listing: bool,

    /// Listing file path; implies -L.
    #[arg(short = 'l', value_name = "LISTING_FILE")]
    listing_file: Option<PathBuf>,

    /// Object file path (default name: source base + .o).
    #[arg(short = 'o', value_name = "OBJECT_FILE")]
    object_file: Option<PathBuf>,

    /// Print version and exit.
    #[arg(short = 'v')]
    version: bool,

    /// Input source file.
    #[arg(value_name = "SOURCE_FILE")]
    input: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(clean) => {
            if !clean {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    if cli.version {
        println!("a65, version {}.", env!("CARGO_PKG_VERSION"));
        return Ok(true);
    }

    let Some(input) = cli.input else {
        anyhow::bail!("usage: a65 [-L] [-l listing-file] [-o object-file] [-v] source-file");
    };

    let source_text = std::fs::read_to_string(&input).map_err(|error| {
        anyhow::anyhow!(
            "could not open source file '{}' for read: {error}",
            input.display()
        )
    })?;

    let assembler = Assembler::new();
    let assembly = assembler.assemble(&input.display().to_string(), &source_text);

    report_diagnostics(&assembly);

    // A stale object from an earlier run must not survive a failing
    // assembly.
    let object_path = cli.object_file.unwrap_or_else(|| input.with_extension("o"));
    let _ = std::fs::remove_file(&object_path);
    if assembly.errors() == 0 {
        write_object(&object_path, &assembly.image).map_err(|error| {
            anyhow::anyhow!(
                "could not write object file '{}': {error}",
                object_path.display()
            )
        })?;
    }

    if cli.listing || cli.listing_file.is_some() {
        let listing_path = cli
            .listing_file
            .unwrap_or_else(|| input.with_extension("lst"));
        write_listing(&listing_path, &assembly).map_err(|error| {
            anyhow::anyhow!(
                "could not write listing file '{}': {error}",
                listing_path.display()
            )
        })?;
    }

    Ok(assembly.errors() == 0)
}

fn report_diagnostics(assembly: &Assembly) {
    let messages = assembly.messages();
    if messages.is_empty() {
        return;
    }

    let color = stderr_supports_color();
    for diagnostic in &messages {
        eprint!("{}", render_diagnostic(&assembly.source, diagnostic, color));
    }
    eprintln!(
        "{} error(s), {} warning(s).",
        assembly.errors(),
        assembly.warnings()
    );
}

fn stderr_supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if let Some(force) = env::var_os("CLICOLOR_FORCE") {
        return force != "0";
    }

    if let Some(choice) = env::var_os("CLICOLOR") {
        if choice == "0" {
            return false;
        }
    }

    std::io::stderr().is_terminal()
}
