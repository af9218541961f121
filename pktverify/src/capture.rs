// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Capture loading.
//!
//! Packets are dissected by `tshark` and read from its JSON export
//! (`tshark -T json -x --no-duplicate-keys`). Each layer object is flattened
//! into a [`Layer`]: field trees and text labels are descended into, repeated
//! fields become repeated occurrences and `<field>_raw` entries supply the
//! raw bytes of the matching occurrence.

use crate::packet::{Layer, Packet, RawField};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

use tracectl::trace_target;
trace_target!("capture", LevelFilter::INFO, &["pktverify"]);

/// Dissector preferences every thread certification capture needs.
pub const DEFAULT_WIRESHARK_PREFS: &[&str] = &[
    "6lowpan.context0:fd00:db8::/64",
    "thread.thr_seq_ctr_acqd:TRUE",
    "thread.thr_seq_ctr:00000000",
    "coap.udp_port:61631",
];

/// Environment variable naming the `tshark` executable.
pub const TSHARK_ENV: &str = "TSHARK";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("can not read capture: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid capture json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed packet at index {index}: {reason}")]
    Format { index: usize, reason: String },
    #[error("dissector failed: {0}")]
    Dissector(String),
    #[error("unsupported capture file {0}")]
    Unsupported(PathBuf),
}

fn format_error(index: usize, reason: impl Into<String>) -> CaptureError {
    CaptureError::Format {
        index,
        reason: reason.into(),
    }
}

/// Parse a dissector JSON export.
///
/// # Errors
///
/// Fails on invalid JSON or when a packet lacks its frame number or
/// timestamp.
pub fn from_json_str(json: &str) -> Result<Vec<Packet>, CaptureError> {
    let doc: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = doc else {
        return Err(format_error(0, "expected an array of packets"));
    };
    let pkts = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_packet(index, entry))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("parsed {} packets", pkts.len());
    Ok(pkts)
}

/// Load a dissector JSON export from a file.
///
/// # Errors
///
/// See [`from_json_str`].
pub fn load_json(path: &Path) -> Result<Vec<Packet>, CaptureError> {
    info!("loading capture {}", path.display());
    let json = std::fs::read_to_string(path)?;
    from_json_str(&json)
}

fn tshark() -> String {
    std::env::var(TSHARK_ENV).unwrap_or_else(|_| "tshark".to_string())
}

/// Dissect a pcap file with `tshark` and load the result.
///
/// `prefs` are `key:value` wireshark preferences, applied after
/// [`DEFAULT_WIRESHARK_PREFS`].
///
/// # Errors
///
/// Fails if `tshark` can not be run or exits with an error, and on any
/// error of [`from_json_str`].
pub fn load_pcap(path: &Path, prefs: &[String]) -> Result<Vec<Packet>, CaptureError> {
    let mut cmd = Command::new(tshark());
    cmd.arg("-r")
        .arg(path)
        .args(["-T", "json", "-x", "--no-duplicate-keys"]);
    for pref in DEFAULT_WIRESHARK_PREFS
        .iter()
        .copied()
        .chain(prefs.iter().map(String::as_str))
    {
        cmd.args(["-o", pref]);
    }
    info!("dissecting {}", path.display());
    debug!("running {cmd:?}");

    let output = cmd
        .output()
        .map_err(|e| CaptureError::Dissector(format!("can not run {}: {e}", tshark())))?;
    if !output.status.success() {
        return Err(CaptureError::Dissector(format!(
            "{}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let json = String::from_utf8(output.stdout)
        .map_err(|e| CaptureError::Dissector(format!("non utf-8 output: {e}")))?;
    from_json_str(&json)
}

/// Load a capture, dissecting it first unless it is already a JSON export.
///
/// # Errors
///
/// Fails with [`CaptureError::Unsupported`] on unknown extensions, and see
/// [`load_json`] and [`load_pcap`].
pub fn load(path: &Path, prefs: &[String]) -> Result<Vec<Packet>, CaptureError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        Some("pcap" | "pcapng") => load_pcap(path, prefs),
        _ => Err(CaptureError::Unsupported(path.to_path_buf())),
    }
}

fn parse_packet(index: usize, entry: &Value) -> Result<Packet, CaptureError> {
    let layers = entry
        .pointer("/_source/layers")
        .and_then(Value::as_object)
        .ok_or_else(|| format_error(index, "missing _source.layers"))?;

    let mut out = Vec::with_capacity(layers.len());
    for (name, value) in layers {
        if name.ends_with("_raw") {
            continue;
        }
        match value {
            Value::Object(fields) => out.push(flatten_layer(name, fields)),
            Value::Array(instances) => {
                for instance in instances {
                    if let Value::Object(fields) = instance {
                        out.push(flatten_layer(name, fields));
                    }
                }
            }
            _ => {}
        }
    }

    let frame = out
        .iter()
        .find(|l| l.name() == "frame")
        .ok_or_else(|| format_error(index, "missing frame layer"))?;
    let first_show = |uri: &str| {
        frame
            .get(uri)
            .and_then(|occ| occ.first())
            .map(|f| f.show.clone())
            .ok_or_else(|| format_error(index, format!("missing {uri}")))
    };
    let number = first_show("frame.number")?
        .parse::<usize>()
        .map_err(|e| format_error(index, format!("bad frame.number: {e}")))?;
    let sniff_timestamp = first_show("frame.time_epoch")?
        .parse::<f64>()
        .map_err(|e| format_error(index, format!("bad frame.time_epoch: {e}")))?;

    Ok(Packet::new(index, number, sniff_timestamp, out))
}

fn flatten_layer(name: &str, fields: &Map<String, Value>) -> Layer {
    let mut layer = Layer::new(name);
    flatten_into(&mut layer, fields);
    layer
}

fn flatten_into(layer: &mut Layer, fields: &Map<String, Value>) {
    for (key, value) in fields {
        if key.ends_with("_raw") {
            continue;
        }
        let is_field = key.contains('.') || key == layer.name();
        let raw = fields.get(&format!("{key}_raw"));
        match value {
            Value::String(show) if is_field => {
                layer.push(key.as_str(), RawField::new(show.as_str(), raw_at(raw, 0)));
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::String(show) if is_field => {
                            layer.push(key.as_str(), RawField::new(show.as_str(), raw_at(raw, i)));
                        }
                        Value::Object(sub) => flatten_into(layer, sub),
                        _ => {}
                    }
                }
            }
            Value::Object(sub) => flatten_into(layer, sub),
            _ => {}
        }
    }
}

/// The raw hex of occurrence `i`. A single occurrence carries
/// `[hex, offset, length, bitmask, type]`, repeated ones an array of those.
fn raw_at(raw: Option<&Value>, i: usize) -> Option<String> {
    match raw? {
        Value::String(hex) if i == 0 => Some(hex.clone()),
        Value::Array(items) => match items.first()? {
            Value::String(hex) if i == 0 => Some(hex.clone()),
            Value::Array(_) => items.get(i)?.get(0)?.as_str().map(str::to_string),
            _ => None,
        },
        _ => None,
    }
}
