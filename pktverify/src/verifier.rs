// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet verifier: a capture, its test information and the variables
//! derived from them.

use crate::addrs::{ExtAddr, Ipv6Addr};
use crate::capture::{self, CaptureError};
use crate::consts;
use crate::errors::VerifyError;
use crate::filter::{PacketFilter, PktIndex, Role};
use crate::packet::Packet;
use crate::summary::Summary;
use crate::test_info::{TestInfo, TestInfoError};
use crate::value::{FieldValue, Vars};
use ordermap::OrderMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use tracectl::trace_target;
trace_target!("verifier", LevelFilter::INFO, &["pktverify"]);

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    TestInfo(#[from] TestInfoError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("variable {0} is already defined")]
    DuplicateVar(String),
}

/// How a child is expected to attach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum ChildType {
    #[serde(rename = "MTD")]
    #[strum(serialize = "MTD")]
    Mtd,
    #[serde(rename = "FTD-ED")]
    #[strum(serialize = "FTD-ED")]
    FtdEd,
    #[serde(rename = "FTD")]
    #[strum(serialize = "FTD")]
    Ftd,
}

/// Indices of the packets found by the steps of a verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyResult {
    indices: OrderMap<String, usize>,
}

impl VerifyResult {
    /// Record the last packet found by `pkts` under `name`.
    pub fn record_last(&mut self, name: &str, pkts: &PacketFilter) {
        if let Some(idx) = pkts.last_index() {
            debug!("{name}: packet at {idx}");
            self.indices.insert(name.to_string(), idx);
        }
    }

    #[must_use]
    pub fn packet_index(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.indices.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Converts a JSON value from the test info into a variable value. Strings
/// stay strings: they compare equal to the addresses they spell.
fn json_to_value(value: &serde_json::Value) -> FieldValue {
    use serde_json::Value;
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Int(i128::from(i)),
            None => n.as_f64().map_or(FieldValue::Null, FieldValue::Float),
        },
        Value::String(s) => FieldValue::Str(s.clone()),
        Value::Array(items) => FieldValue::List(items.iter().map(json_to_value).collect()),
        Value::Object(_) => FieldValue::Str(value.to_string()),
    }
}

/// A capture under verification, with its test info and variables.
#[derive(Debug)]
pub struct PacketVerifier {
    test_info: TestInfo,
    pkts: PacketFilter,
    vars: Vars,
    summary: Summary,
}

impl PacketVerifier {
    /// Load the test info and the capture it names.
    ///
    /// # Errors
    ///
    /// Fails if either can not be loaded, or on conflicting variables.
    pub fn new(test_info_path: &Path, prefs: &[String]) -> Result<Self, VerifierError> {
        let test_info = TestInfo::load(test_info_path)?;
        let packets = capture::load(&test_info.pcap_path(), prefs)?;
        Self::from_parts(test_info, packets)
    }

    /// Build a verifier from already loaded parts.
    ///
    /// # Errors
    ///
    /// Fails with [`VerifierError::DuplicateVar`] if an extra variable of the
    /// test info clashes with a node variable.
    pub fn from_parts(test_info: TestInfo, packets: Vec<Packet>) -> Result<Self, VerifierError> {
        let mut verifier = PacketVerifier {
            summary: Summary::default(),
            pkts: PacketFilter::new(packets),
            vars: Vars::new(),
            test_info,
        };
        verifier.add_node_vars()?;
        let extra: Vec<(String, FieldValue)> = verifier
            .test_info
            .extra_vars
            .iter()
            .map(|(k, v)| (k.clone(), json_to_value(v)))
            .collect();
        verifier.add_vars(extra)?;
        verifier.summary = Summary::new(verifier.pkts.iter().as_slice(), &verifier.vars);
        info!(
            "{}: {} packets, {} variables",
            verifier.test_name(),
            verifier.pkts.len(),
            verifier.vars.len()
        );
        Ok(verifier)
    }

    fn add_node_vars(&mut self) -> Result<(), VerifierError> {
        let info = &self.test_info;
        let mut vars: Vec<(String, FieldValue)> = Vec::new();

        for id in info.node_ids() {
            let name = info.node_name(id);
            if let Some(ext) = info.extaddrs.get(&id) {
                vars.push((name.clone(), (*ext).into()));
                vars.push((format!("{name}_LLA"), ext.link_local().into()));
            }
            if let Some(eth) = info.ethaddrs.get(&id) {
                vars.push((format!("{name}_ETH"), (*eth).into()));
            }
            if let Some(addrs) = info.ipaddrs.get(&id) {
                vars.push((format!("{name}_IPADDRS"), addrs.clone().into()));
                if let Some(prefix) = &info.domain_prefix
                    && let Some(dua) = addrs.iter().find(|a| a.is_dua(prefix))
                {
                    vars.push((format!("{name}_DUA"), (*dua).into()));
                }
                if let Some(backbone) = &info.backbone {
                    if let Some(bgua) = addrs.iter().find(|a| a.is_backbone_gua(&backbone.prefix)) {
                        vars.push((format!("{name}_BGUA"), (*bgua).into()));
                    }
                    let thread_lla = info.extaddrs.get(&id).map(ExtAddr::link_local);
                    if let Some(blla) = addrs
                        .iter()
                        .find(|a| a.is_link_local() && Some(**a) != thread_lla)
                    {
                        vars.push((format!("{name}_BLLA"), (*blla).into()));
                    }
                }
            }
            if let Some(rloc16) = info.rloc16s.get(&id) {
                vars.push((format!("{name}_RLOC16"), rloc16.0.into()));
            }
            if let Some(rloc) = info.rlocs.get(&id) {
                vars.push((format!("{name}_RLOC"), (*rloc).into()));
            }
            if let Some(omrs) = info.omrs.get(&id) {
                vars.push((format!("{name}_OMR"), omrs.clone().into()));
            }
            if let Some(mleid) = info.mleids.get(&id) {
                vars.push((format!("{name}_MLEID"), (*mleid).into()));
            }
        }
        if let Some(aloc) = info.leader_aloc {
            vars.push(("LEADER_ALOC".to_string(), aloc.into()));
        }
        self.add_vars(vars)
    }

    /// Add variables.
    ///
    /// # Errors
    ///
    /// Fails with [`VerifierError::DuplicateVar`] on the first name already
    /// defined; the variables before it are kept.
    pub fn add_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> Result<(), VerifierError> {
        for (name, value) in vars {
            if self.vars.contains_key(&name) {
                return Err(VerifierError::DuplicateVar(name));
            }
            debug!("var {name} = {value}");
            self.vars.insert(name, value);
        }
        Ok(())
    }

    #[must_use]
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<&FieldValue> {
        self.vars.get(name)
    }

    #[must_use]
    pub fn pkts(&self) -> &PacketFilter {
        &self.pkts
    }

    #[must_use]
    pub fn test_info(&self) -> &TestInfo {
        &self.test_info
    }

    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_info.testcase
    }

    #[must_use]
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// The index just past the end of the capture.
    #[must_use]
    pub fn max_index(&self) -> PktIndex {
        PktIndex::new(self.pkts.len(), self.pkts.len())
    }

    fn ext_addr_var(&self, name: &str) -> Result<ExtAddr, VerifyError> {
        self.var(name)
            .and_then(FieldValue::as_ext_addr)
            .ok_or_else(|| VerifyError::InvalidArgument(format!("{name} is not an extended address")))
    }

    fn ipv6_var(&self, name: &str) -> Result<Ipv6Addr, VerifyError> {
        self.var(name)
            .and_then(FieldValue::as_ipv6)
            .ok_or_else(|| VerifyError::InvalidArgument(format!("{name} is not an ipv6 address")))
    }

    /// Verify that `child` attached to `parent`: a Child ID Request and
    /// Response between the two and, for a router capable child, the
    /// router upgrade (address solicit and first advertisement).
    ///
    /// The router upgrade is searched without moving the cursor past the
    /// Child ID Response.
    ///
    /// # Errors
    ///
    /// Fails if a step is not found or a name is not a node.
    pub fn verify_attached(
        &self,
        child: &str,
        parent: &str,
        child_type: ChildType,
    ) -> Result<VerifyResult, VerifyError> {
        let child_addr = self.ext_addr_var(child)?;
        let parent_addr = self.ext_addr_var(parent)?;
        let pkts = &self.pkts;
        let mut result = VerifyResult::default();
        info!("verifying {child} ({child_type}) attached to {parent}");

        pkts.filter_wpan_src64(child_addr)
            .filter_wpan_dst64(parent_addr)
            .filter_mle_cmd(consts::MLE_CHILD_ID_REQUEST)
            .must_next()?;
        result.record_last("child_id_request", pkts);

        pkts.filter_wpan_src64(parent_addr)
            .filter_wpan_dst64(child_addr)
            .filter_mle_cmd(consts::MLE_CHILD_ID_RESPONSE)
            .must_next()?;
        result.record_last("child_id_response", pkts);

        if child_type == ChildType::Ftd {
            let _saved = pkts.save_index();

            pkts.filter_wpan_src64(child_addr)
                .filter_coap_request(consts::ADDR_SOL_URI, None, None)
                .must_next()?;
            result.record_last("address_solicit", pkts);

            pkts.filter_coap_ack(consts::ADDR_SOL_URI, None).must_next()?;
            result.record_last("address_solicit_response", pkts);

            pkts.filter_wpan_src64(child_addr)
                .filter_mle_advertisement(Role::Router)
                .must_next()?;
            result.record_last("mle_advertisement", pkts);
        }
        Ok(result)
    }

    /// Verify an echo request from `src` to `dst` and the matching reply.
    /// `src` and `dst` name variables holding IPv6 addresses.
    ///
    /// # Errors
    ///
    /// Fails if the request or the reply is not found.
    pub fn verify_ping(&self, src: &str, dst: &str) -> Result<VerifyResult, VerifyError> {
        let src_addr = self.ipv6_var(src)?;
        let dst_addr = self.ipv6_var(dst)?;
        let pkts = &self.pkts;
        let mut result = VerifyResult::default();
        info!("verifying ping {src} ({src_addr}) -> {dst} ({dst_addr})");

        let request = pkts
            .filter_ipv6_src_dst(src_addr, dst_addr)
            .filter_ping_request(None)
            .must_next()?;
        result.record_last("ping_request", pkts);
        let identifier = request
            .int("icmpv6.echo.identifier")
            .and_then(|id| u16::try_from(id).ok());

        pkts.filter_ipv6_src_dst(dst_addr, src_addr)
            .filter_ping_reply(identifier)
            .must_next()?;
        result.record_last("ping_reply", pkts);
        Ok(result)
    }
}
