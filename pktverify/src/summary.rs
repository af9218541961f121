// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Capture summary.

use crate::consts;
use crate::packet::Packet;
use crate::value::{FieldValue, Vars};
use ordermap::OrderMap;
use serde::Serialize;
use std::fmt::Display;
use tracing::info;

use tracectl::trace_target;
trace_target!("summary", LevelFilter::INFO, &["pktverify"]);

/// Statistics over a capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub wpan: usize,
    pub eth: usize,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    /// Packets carrying each layer, in order of first appearance.
    pub layers: OrderMap<String, usize>,
    /// MLE messages per command name.
    pub mle_commands: OrderMap<String, usize>,
    /// Frames sent per node, keyed by variable name (or address when no
    /// variable holds it).
    pub senders: OrderMap<String, usize>,
}

impl Summary {
    #[must_use]
    pub fn new(pkts: &[Packet], vars: &Vars) -> Self {
        let mut summary = Summary {
            total: pkts.len(),
            ..Default::default()
        };

        for p in pkts {
            if p.wpan() {
                summary.wpan += 1;
            }
            if p.eth() {
                summary.eth += 1;
            }
            let ts = p.sniff_timestamp();
            summary.first_timestamp = Some(summary.first_timestamp.map_or(ts, |t| t.min(ts)));
            summary.last_timestamp = Some(summary.last_timestamp.map_or(ts, |t| t.max(ts)));

            let mut seen: Vec<&str> = Vec::new();
            for layer in p.layers() {
                if !seen.contains(&layer.name()) {
                    seen.push(layer.name());
                    *summary.layers.entry(layer.name().to_string()).or_default() += 1;
                }
            }

            if let Some(cmd) = p.int("mle.cmd") {
                let name = consts::mle_command_name(cmd)
                    .map_or_else(|| format!("Unknown ({cmd})"), str::to_string);
                *summary.mle_commands.entry(name).or_default() += 1;
            }

            let sender = if p.wpan() {
                p.ext_addr("wpan.src64").map(FieldValue::ExtAddr)
            } else if p.eth() {
                p.eth_addr("eth.src").map(FieldValue::EthAddr)
            } else {
                None
            };
            if let Some(sender) = sender {
                *summary.senders.entry(sender_name(&sender, vars)).or_default() += 1;
            }
        }
        summary
    }

    /// Capture duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Log the summary.
    pub fn show(&self) {
        for line in self.to_string().lines() {
            info!("{line}");
        }
    }
}

fn sender_name(addr: &FieldValue, vars: &Vars) -> String {
    vars.iter()
        .find(|(_, v)| v.loose_eq(addr))
        .map_or_else(|| addr.to_string(), |(name, _)| name.clone())
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} packets ({} wpan, {} eth) over {:.3}s",
            self.total,
            self.wpan,
            self.eth,
            self.duration()
        )?;
        let sections = [
            ("layer", &self.layers),
            ("mle command", &self.mle_commands),
            ("sender", &self.senders),
        ];
        for (title, counts) in sections {
            if counts.is_empty() {
                continue;
            }
            let width = counts.keys().map(String::len).max().unwrap_or(0).max(title.len());
            writeln!(f, "  {title:<width$}  count")?;
            for (name, count) in counts {
                writeln!(f, "  {name:<width$}  {count:>5}")?;
            }
        }
        Ok(())
    }
}
