// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub use clap::Parser;
use clap::Subcommand;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// A wireshark preference, `key:value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiresharkPref {
    key: String,
    value: String,
}

impl WiresharkPref {
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for WiresharkPref {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.split_once(':') {
            Some((key, value)) if !key.is_empty() && !key.contains(char::is_whitespace) => {
                Ok(WiresharkPref {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            Some(_) => Err(format!("Bad preference name in '{input}'")),
            None => Err(format!("Preference '{input}' is not of the form key:value")),
        }
    }
}

impl Display for WiresharkPref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a verification scenario against a capture
    Verify {
        #[arg(value_name = "TEST_INFO", help = "Test info document written by the test runner")]
        test_info: PathBuf,
        #[arg(long, value_name = "FILE", help = "Verification scenario (YAML)")]
        scenario: PathBuf,
        #[arg(
            long,
            value_name = "FILE",
            help = "Capture to verify, overriding the one named by the test info"
        )]
        capture: Option<PathBuf>,
    },
    /// Show a summary of a capture
    Summary {
        #[arg(value_name = "TEST_INFO")]
        test_info: PathBuf,
        #[arg(long, value_name = "FILE")]
        capture: Option<PathBuf>,
    },
    /// List the packets of a capture matching a filter expression
    Query {
        #[arg(value_name = "TEST_INFO")]
        test_info: PathBuf,
        #[arg(
            long,
            value_name = "EXPR",
            help = "Filter expression, e.g. 'wpan.src64 == {LEADER} and mle.cmd == MLE_ADVERTISEMENT'"
        )]
        filter: String,
        #[arg(long, value_name = "FILE")]
        capture: Option<PathBuf>,
        #[arg(long, value_name = "N", help = "Stop after N packets")]
        limit: Option<usize>,
    },
}

#[derive(Debug, Parser)]
#[command(name = "pktverify")]
#[command(version)]
#[command(about = "Verify Thread certification captures", long_about = None)]
pub struct CmdArgs {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(
        long,
        value_name = "key:value",
        value_parser = WiresharkPref::from_str,
        help = "Wireshark preference applied when dissecting pcap captures. May be repeated.
E.g. --wireshark-pref 6lowpan.context1:fd00:7d03::/64"
    )]
    wireshark_pref: Vec<WiresharkPref>,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
Passing all=level allows setting the log-level of all targets to level.
E.g. default=error,all=info,packet-filter=debug will set the default target to error, and all the registered targets to info, but enable debug for the packet filter"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }
    pub fn tracing(&self) -> Option<&String> {
        self.tracing.as_ref()
    }

    /// The wireshark preferences, as `key:value` strings.
    pub fn wireshark_prefs(&self) -> Vec<String> {
        let prefs: Vec<String> = self.wireshark_pref.iter().map(ToString::to_string).collect();
        debug!("wireshark preferences: {prefs:?}");
        prefs
    }

    /// The test info document of the command, if any.
    pub fn test_info(&self) -> Option<&Path> {
        match self.command.as_ref()? {
            Command::Verify { test_info, .. }
            | Command::Summary { test_info, .. }
            | Command::Query { test_info, .. } => Some(test_info),
        }
    }

    /// The capture overriding the one named by the test info, if any.
    pub fn capture(&self) -> Option<&Path> {
        match self.command.as_ref()? {
            Command::Verify { capture, .. }
            | Command::Summary { capture, .. }
            | Command::Query { capture, .. } => capture.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_pref() {
        let pref = WiresharkPref::from_str("6lowpan.context1:fd00:7d03::/64").unwrap();
        assert_eq!(pref.key(), "6lowpan.context1");
        assert_eq!(pref.value(), "fd00:7d03::/64");
        assert_eq!(pref.to_string(), "6lowpan.context1:fd00:7d03::/64");

        // empty values are allowed
        assert_eq!(WiresharkPref::from_str("coap.udp_port:").unwrap().value(), "");

        assert!(WiresharkPref::from_str("no-value").is_err());
        assert!(WiresharkPref::from_str(":value").is_err());
        assert!(WiresharkPref::from_str("bad key:value").is_err());
    }

    #[test]
    fn test_parse_commands() {
        let args = CmdArgs::try_parse_from([
            "pktverify",
            "--tracing",
            "default=info,packet-filter=debug",
            "--wireshark-pref",
            "thread.thr_seq_ctr:00000001",
            "verify",
            "out/test_info.json",
            "--scenario",
            "cert_5_1_01.yaml",
        ])
        .unwrap();
        assert_eq!(args.test_info(), Some(Path::new("out/test_info.json")));
        assert_eq!(args.capture(), None);
        assert_eq!(args.wireshark_prefs(), vec!["thread.thr_seq_ctr:00000001"]);
        assert_eq!(args.tracing().map(String::as_str), Some("default=info,packet-filter=debug"));
        assert!(matches!(args.command(), Some(Command::Verify { .. })));

        let args = CmdArgs::try_parse_from([
            "pktverify",
            "query",
            "test_info.json",
            "--filter",
            "mle.cmd == 4",
            "--limit",
            "3",
            "--capture",
            "other.pcap",
        ])
        .unwrap();
        assert_eq!(args.capture(), Some(Path::new("other.pcap")));
        assert!(matches!(
            args.command(),
            Some(Command::Query { limit: Some(3), .. })
        ));

        let args = CmdArgs::try_parse_from(["pktverify", "--show-tracing-targets"]).unwrap();
        assert!(args.show_tracing_targets());
        assert!(args.command().is_none());

        assert!(CmdArgs::try_parse_from(["pktverify", "verify", "test_info.json"]).is_err());
    }
}
