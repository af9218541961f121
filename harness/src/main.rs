// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

mod scenario;

use crate::scenario::{Scenario, ScenarioError};
use args::{CmdArgs, Command, Parser};
use pktverify::{ExprError, PacketVerifier, TestInfo, VerifierError, capture};
use std::path::Path;
use std::process::ExitCode;
use thiserror::Error;
use tracectl::{get_trace_ctl, trace_target};
use tracing::{error, info, level_filters::LevelFilter};

trace_target!("harness", LevelFilter::INFO, &["harness"]);

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Debug, Error)]
enum HarnessError {
    #[error(transparent)]
    Verifier(#[from] VerifierError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error("no command given, see --help")]
    NoCommand,
}

impl HarnessError {
    fn exit_code(&self) -> ExitCode {
        match self {
            HarnessError::Scenario(e) if e.is_verification_failure() => ExitCode::from(EXIT_FAILED),
            _ => ExitCode::from(EXIT_USAGE),
        }
    }
}

fn init_logging() {
    let tctl = get_trace_ctl();
    tctl.set_default_level(LevelFilter::WARN);
}

/// Load the test info and a capture: the one given on the command line, or
/// else the one the test info names.
fn load_verifier(
    test_info: &Path,
    capture: Option<&Path>,
    prefs: &[String],
) -> Result<PacketVerifier, HarnessError> {
    let Some(capture) = capture else {
        return Ok(PacketVerifier::new(test_info, prefs)?);
    };
    let info = TestInfo::load(test_info).map_err(VerifierError::from)?;
    let packets = capture::load(capture, prefs).map_err(VerifierError::from)?;
    Ok(PacketVerifier::from_parts(info, packets)?)
}

fn run(args: &CmdArgs) -> Result<(), HarnessError> {
    let command = args.command().ok_or(HarnessError::NoCommand)?;
    let prefs = args.wireshark_prefs();
    match command {
        Command::Verify {
            test_info,
            scenario,
            capture,
        } => {
            let scenario = Scenario::load(scenario)?;
            let mut verifier = load_verifier(test_info, capture.as_deref(), &prefs)?;
            scenario.run(&mut verifier)?;
            println!("Packet verification passed: {}", test_info.display());
        }
        Command::Summary { test_info, capture } => {
            let verifier = load_verifier(test_info, capture.as_deref(), &prefs)?;
            verifier.summary().show();
            print!("{}", verifier.summary());
        }
        Command::Query {
            test_info,
            filter,
            capture,
            limit,
        } => {
            let verifier = load_verifier(test_info, capture.as_deref(), &prefs)?;
            let found = verifier.pkts().filter_expr(filter, verifier.vars())?;
            let mut count = 0;
            while limit.is_none_or(|limit| count < limit)
                && let Some(p) = found.next()
            {
                println!("{p}");
                count += 1;
            }
            info!("{count} packets match '{filter}'");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    /* parse cmd line args */
    let args = CmdArgs::parse();

    /* initialize logging */
    init_logging();
    if let Some(tracing) = args.tracing()
        && let Err(e) = get_trace_ctl().setup_from_string(tracing)
    {
        error!("Invalid tracing configuration: {e}");
        return ExitCode::from(EXIT_USAGE);
    }
    if args.show_tracing_targets() {
        get_trace_ctl().dump();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if let Some(test_info) = args.test_info() {
                eprintln!("Packet verification failed: {}: {e}", test_info.display());
            }
            e.exit_code()
        }
    }
}
