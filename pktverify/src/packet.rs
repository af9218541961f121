// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dissected packets.
//!
//! A [`Packet`] is the dissector's view of one captured frame: an ordered
//! list of protocol [`Layer`]s, each a multimap from field names to the raw
//! occurrences of that field. Typed access goes through the field registry
//! in [`crate::layer_fields`].

use crate::addrs::{EthAddr, ExtAddr, Ipv6Addr};
use crate::bytes::Bytes;
use crate::errors::VerifyError;
use crate::expr::Expr;
use crate::layer_fields::{self, FieldError};
use crate::value::{FieldValue, Vars};
use ordermap::OrderMap;
use std::fmt::Display;
use tracing::{debug, info, warn};

use tracectl::trace_target;
trace_target!("packet", LevelFilter::INFO, &["pktverify"]);

/// One occurrence of a field: the dissector's display value and, when
/// available, the hex of the bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub show: String,
    pub raw: Option<String>,
}

impl RawField {
    #[must_use]
    pub fn new(show: impl Into<String>, raw: Option<String>) -> Self {
        Self {
            show: show.into(),
            raw,
        }
    }
}

/// A protocol layer and the fields dissected from it (including the fields
/// of protocols nested in its subtree).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layer {
    name: String,
    fields: OrderMap<String, Vec<RawField>>,
}

impl Layer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: OrderMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an occurrence of a field.
    pub fn push(&mut self, uri: impl Into<String>, field: RawField) {
        self.fields.entry(uri.into()).or_default().push(field);
    }

    /// All occurrences of a field, in dissection order.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&[RawField]> {
        self.fields.get(uri).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[RawField])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns true if a field named `path` or nested under `path.` exists.
    #[must_use]
    pub fn has_path(&self, path: &str) -> bool {
        self.fields.keys().any(|k| {
            k.strip_prefix(path)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }
}

/// A captured and dissected packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    index: usize,
    number: usize,
    sniff_timestamp: f64,
    layers: Vec<Layer>,
}

impl Packet {
    /// Create a packet. `index` is the 0-based position in the capture,
    /// `number` the dissector's 1-based frame number.
    #[must_use]
    pub fn new(index: usize, number: usize, sniff_timestamp: f64, layers: Vec<Layer>) -> Self {
        Self {
            index,
            number,
            sniff_timestamp,
            layers,
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn number(&self) -> usize {
        self.number
    }

    /// Capture time, seconds since the epoch.
    #[must_use]
    pub fn sniff_timestamp(&self) -> f64 {
        self.sniff_timestamp
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Every layer with the given name, outermost first.
    pub fn layers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Layer> + 'a {
        self.layers.iter().filter(move |l| l.name == name)
    }

    #[must_use]
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.name == name)
    }

    /// Returns true if the packet was captured on the 802.15.4 medium.
    #[must_use]
    pub fn wpan(&self) -> bool {
        self.has_layer("wpan")
    }

    /// Returns true if the packet was captured on the ethernet backbone.
    #[must_use]
    pub fn eth(&self) -> bool {
        self.has_layer("eth")
    }

    /// Decode a field, failing on unknown names and undecodable values.
    ///
    /// # Errors
    ///
    /// See [`FieldError`].
    pub fn try_field(&self, uri: &str) -> Result<FieldValue, FieldError> {
        layer_fields::get_layer_field(self, uri)
    }

    /// Decode a field; failures are logged and read as [`FieldValue::Null`].
    #[must_use]
    pub fn field(&self, uri: &str) -> FieldValue {
        self.try_field(uri).unwrap_or_else(|e| {
            warn!("packet #{}: {e}", self.number);
            FieldValue::Null
        })
    }

    /// Returns true if the field or field container is present.
    #[must_use]
    pub fn exists(&self, uri: &str) -> bool {
        layer_fields::check_layer_field_exists(self, uri).unwrap_or_else(|e| {
            warn!("packet #{}: {e}", self.number);
            false
        })
    }

    #[must_use]
    pub fn int(&self, uri: &str) -> Option<i128> {
        self.field(uri).as_int()
    }

    /// Integer elements of a list field (a scalar reads as one element).
    #[must_use]
    pub fn ints(&self, uri: &str) -> Vec<i128> {
        match self.field(uri) {
            FieldValue::List(items) | FieldValue::Set(items) => {
                items.iter().filter_map(FieldValue::as_int).collect()
            }
            other => other.as_int().into_iter().collect(),
        }
    }

    #[must_use]
    pub fn str_field(&self, uri: &str) -> Option<String> {
        match self.field(uri) {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn ext_addr(&self, uri: &str) -> Option<ExtAddr> {
        self.field(uri).as_ext_addr()
    }

    #[must_use]
    pub fn eth_addr(&self, uri: &str) -> Option<EthAddr> {
        self.field(uri).as_eth_addr()
    }

    #[must_use]
    pub fn ipv6(&self, uri: &str) -> Option<Ipv6Addr> {
        self.field(uri).as_ipv6()
    }

    #[must_use]
    pub fn bytes(&self, uri: &str) -> Option<Bytes> {
        match self.field(uri) {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Check a condition on this packet.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::VerificationFailed`] (after dumping the
    /// packet) when the condition does not hold.
    pub fn must_verify(
        &self,
        what: &str,
        cond: impl FnOnce(&Packet) -> bool,
    ) -> Result<&Self, VerifyError> {
        if cond(self) {
            Ok(self)
        } else {
            self.show();
            Err(VerifyError::VerificationFailed {
                number: self.number,
                reason: what.to_string(),
            })
        }
    }

    /// Check a filter expression on this packet.
    ///
    /// # Errors
    ///
    /// Fails if the expression does not compile or does not hold.
    pub fn must_verify_expr(&self, source: &str, vars: &Vars) -> Result<&Self, VerifyError> {
        let expr = Expr::compile(source, vars)?;
        self.must_verify(source, |p| expr.matches(p))
    }

    /// Dump the packet layers and raw fields.
    pub fn show(&self) {
        info!("{self}");
        for layer in &self.layers {
            info!("  layer {}:", layer.name);
            for (uri, occurrences) in layer.fields() {
                for occ in occurrences {
                    match &occ.raw {
                        Some(raw) => info!("    {uri} = {} ({raw})", occ.show),
                        None => info!("    {uri} = {}", occ.show),
                    }
                }
            }
        }
    }

    /// Log the decoded value of every registered field present in the packet.
    pub fn debug_fields(&self) {
        for layer in &self.layers {
            for (uri, _) in layer.fields() {
                if layer_fields::is_layer_field(uri) {
                    debug!("#{} {uri} = {}", self.number, self.field(uri));
                }
            }
        }
    }
}

impl Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} @{:.6} ", self.number, self.sniff_timestamp)?;
        let mut first = true;
        for layer in &self.layers {
            if layer.name == "frame" {
                continue;
            }
            if !first {
                write!(f, "/")?;
            }
            first = false;
            write!(f, "{}", layer.name)?;
        }
        Ok(())
    }
}
