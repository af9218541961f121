// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Builders for synthetic captures in the dissector JSON export format.

use serde_json::{Map, Value, json};
use std::path::Path;

/// A packet of a synthetic capture. Fields are added to the layer named by
/// the first component of their uri, creating the layer on first use.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    timestamp: f64,
    layers: Map<String, Value>,
}

impl PacketBuilder {
    fn new(timestamp: f64, medium: &str, protocols: &str) -> Self {
        let mut layers = Map::new();
        layers.insert(
            "frame".to_string(),
            json!({
                "frame.time_epoch": format!("{timestamp:.9}"),
                "frame.protocols": protocols,
            }),
        );
        layers.insert(medium.to_string(), Value::Object(Map::new()));
        PacketBuilder { timestamp, layers }
    }

    /// An 802.15.4 frame captured at `timestamp`.
    #[must_use]
    pub fn wpan(timestamp: f64) -> Self {
        Self::new(timestamp, "wpan", "wpan")
    }

    /// An ethernet frame captured at `timestamp`.
    #[must_use]
    pub fn eth(timestamp: f64) -> Self {
        Self::new(timestamp, "eth", "eth:ethertype")
    }

    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Add an (empty) layer.
    #[must_use]
    pub fn layer(mut self, name: &str) -> Self {
        self.layers
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        self
    }

    /// Add an occurrence of a field. Adding the same field again makes it
    /// repeated.
    #[must_use]
    pub fn field(self, uri: &str, show: &str) -> Self {
        self.push(uri, show, None)
    }

    /// Add an occurrence of a field along with its raw bytes.
    #[must_use]
    pub fn field_raw(self, uri: &str, show: &str, raw: &str) -> Self {
        self.push(uri, show, Some(raw))
    }

    fn push(mut self, uri: &str, show: &str, raw: Option<&str>) -> Self {
        let name = uri.split('.').next().unwrap_or(uri);
        let layer = self
            .layers
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(fields) = layer {
            append(fields, uri, Value::from(show));
            if let Some(raw) = raw {
                let len = raw.len() / 2;
                append(fields, &format!("{uri}_raw"), json!([raw, 0, len, 0, 1]));
            }
        }
        self
    }

    fn build(mut self, number: usize) -> Value {
        if let Some(Value::Object(frame)) = self.layers.get_mut("frame") {
            frame.insert("frame.number".to_string(), Value::from(number.to_string()));
        }
        json!({
            "_index": "packets",
            "_type": "doc",
            "_source": { "layers": self.layers },
        })
    }
}

/// Repeated fields are arrays of occurrences. Raw entries of a single
/// occurrence are themselves arrays, hence the special case.
fn append(fields: &mut Map<String, Value>, key: &str, value: Value) {
    let is_raw = key.ends_with("_raw");
    match fields.get_mut(key) {
        None => {
            fields.insert(key.to_string(), value);
        }
        Some(Value::Array(items))
            if (!is_raw && !items.is_empty()) || (is_raw && items.first().is_some_and(Value::is_array)) =>
        {
            items.push(value);
        }
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// A synthetic capture: packets are numbered from 1 in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuilder {
    packets: Vec<PacketBuilder>,
}

impl CaptureBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn packet(mut self, packet: PacketBuilder) -> Self {
        self.packets.push(packet);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.packets
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, p)| p.build(i + 1))
                .collect(),
        )
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Write the capture as a JSON export.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be written.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_json())
    }
}
