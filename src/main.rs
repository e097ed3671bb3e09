#![warn(missing_docs)]
//! The command line interpreter for the Ember scripting language.
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use tracing::{error, info};

mod config;
mod diagnostics;
mod interpreter;
mod parser;
mod pipeline;
mod semantics;

use config::{Config, DEFAULT_DIAGNOSTIC_TOLERANCE, DEFAULT_RECURSION_LIMIT};
use parser::source::FileSource;


#[derive(Debug, ClapParser)]
#[command(name = "ember", version, about = "Runs an Ember script")]
struct Args {
    /// Path of the script to run.
    script: PathBuf,

    /// How deep function calls may nest, at most 8192.
    #[arg(long, default_value_t = DEFAULT_RECURSION_LIMIT)]
    recursion_limit: usize,

    /// How many semantic warnings to collect before giving up.
    #[arg(long, default_value_t = DEFAULT_DIAGNOSTIC_TOLERANCE)]
    tolerance: usize,

    /// Log more of what the interpreter does; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}


fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // logs share stderr with diagnostics so stdout stays the script's own
    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(formatter)
        .init();
}


fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose, args.quiet);

    let config = Config {
        recursion_limit: args.recursion_limit,
        diagnostic_tolerance: args.tolerance,
    };
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let source = match FileSource::open(&args.script) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("could not open {}: {}", args.script.display(), e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        script = %args.script.display(),
        error_table = diagnostics::ERROR_TABLE_VERSION,
        "running script"
    );
    // the interpreter runs on its own thread, so stdin is read through an owned reader
    // rather than a lock tied to this one
    match pipeline::run(source, &config, io::BufReader::new(io::stdin()), io::stdout()) {
        Ok(outcome) if !outcome.diagnostics.is_empty() => {
            for diagnostic in outcome.diagnostics.records() {
                eprintln!("{}", diagnostic);
            }
            ExitCode::FAILURE
        }
        // exit statuses are a single byte, so main's value is truncated like any process status
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) if e.is_fatal() => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
