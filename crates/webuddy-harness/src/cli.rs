#![forbid(unsafe_code)]

//! Command-line argument parsing for the harness.
//!
//! Parses args by hand; the surface is one path and two flags.

use std::env;
use std::path::PathBuf;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Webuddy Harness: replay a page scenario and print its stage trace

USAGE:
    webuddy-harness [OPTIONS] <SCENARIO.json>

OPTIONS:
    --ops-only       Omit replayed inputs from the trace
    --help, -h       Show this help message
    --version, -V    Show version

Pass `-` as the scenario to read it from stdin.

ENVIRONMENT VARIABLES:
    RUST_LOG         Log filter for stderr diagnostics (default: warn)";

/// Parsed command-line options.
#[derive(Debug, Default)]
pub struct Opts {
    /// Scenario file, or `None` for stdin.
    pub scenario: Option<PathBuf>,
    /// Drop input lines from the output.
    pub ops_only: bool,
}

impl Opts {
    /// Parse `std::env::args`, exiting on `--help`, `--version`, or misuse.
    pub fn parse() -> Self {
        match Self::parse_from(env::args().skip(1)) {
            Ok(opts) => opts,
            Err(Exit::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(Exit::Version) => {
                println!("webuddy-harness {VERSION}");
                process::exit(0);
            }
            Err(Exit::Usage(message)) => {
                eprintln!("error: {message}\n\n{HELP_TEXT}");
                process::exit(2);
            }
        }
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self, Exit> {
        let mut opts = Opts::default();
        let mut path = None;
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Err(Exit::Help),
                "--version" | "-V" => return Err(Exit::Version),
                "--ops-only" => opts.ops_only = true,
                flag if flag.starts_with("--") => {
                    return Err(Exit::Usage(format!("unknown option {flag}")));
                }
                _ if path.is_some() => {
                    return Err(Exit::Usage("only one scenario may be given".into()));
                }
                _ => path = Some(arg),
            }
        }
        match path.as_deref() {
            None => Err(Exit::Usage("missing scenario path".into())),
            Some("-") => Ok(opts),
            Some(p) => {
                opts.scenario = Some(PathBuf::from(p));
                Ok(opts)
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Help,
    Version,
    Usage(String),
}
