#![forbid(unsafe_code)]

//! `webuddy-harness`: replay a scenario, print the trace as JSONL.

mod cli;

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use webuddy_harness::{Scenario, replay};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let opts = cli::Opts::parse();
    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("webuddy-harness: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &cli::Opts) -> Result<(), Box<dyn std::error::Error>> {
    let text = match &opts.scenario {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let scenario = Scenario::from_json(&text)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in replay(&scenario) {
        if opts.ops_only && line.op.is_none() {
            continue;
        }
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
