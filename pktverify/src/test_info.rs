// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Test information written by the test runner next to each capture.

use crate::addrs::{EthAddr, ExtAddr, Ipv6Addr, Ipv6Prefix};
use ordermap::OrderMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use tracectl::trace_target;
trace_target!("test-info", LevelFilter::INFO, &["pktverify"]);

/// Node identifier, as used by the topology.
pub type NodeId = u32;

#[derive(Debug, Error)]
pub enum TestInfoError {
    #[error("can not read test info {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid test info: {0}")]
    Json(#[from] serde_json::Error),
}

/// An RLOC16. Test runners write it either as an integer or as a hex string
/// (with or without a `0x` prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Rloc16Repr", into = "u16")]
pub struct Rloc16(pub u16);

#[derive(Deserialize)]
#[serde(untagged)]
enum Rloc16Repr {
    Int(u16),
    Str(String),
}

impl TryFrom<Rloc16Repr> for Rloc16 {
    type Error = String;

    fn try_from(value: Rloc16Repr) -> Result<Self, Self::Error> {
        match value {
            Rloc16Repr::Int(v) => Ok(Rloc16(v)),
            Rloc16Repr::Str(s) => {
                let hex = s.trim_start_matches("0x").trim_start_matches("0X");
                u16::from_str_radix(hex, 16)
                    .map(Rloc16)
                    .map_err(|e| format!("invalid rloc16 '{s}': {e}"))
            }
        }
    }
}

impl From<Rloc16> for u16 {
    fn from(value: Rloc16) -> Self {
        value.0
    }
}

/// A node of the test topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub is_otbr: bool,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub version: Option<String>,
    /// Everything else the runner records about the node.
    #[serde(flatten)]
    pub extra: OrderMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backbone {
    pub interface: String,
    pub prefix: Ipv6Prefix,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<OrderMap<NodeId, Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let map = OrderMap::<NodeId, OneOrMany<T>>::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .map(|(id, v)| match v {
            OneOrMany::One(one) => (id, vec![one]),
            OneOrMany::Many(many) => (id, many),
        })
        .collect())
}

/// The test information document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    pub testcase: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    /// The capture, relative to the test info document unless absolute.
    pub pcap: PathBuf,
    #[serde(default)]
    pub extaddrs: OrderMap<NodeId, ExtAddr>,
    #[serde(default)]
    pub ethaddrs: OrderMap<NodeId, EthAddr>,
    #[serde(default)]
    pub ipaddrs: OrderMap<NodeId, Vec<Ipv6Addr>>,
    #[serde(default)]
    pub mleids: OrderMap<NodeId, Ipv6Addr>,
    #[serde(default)]
    pub rloc16s: OrderMap<NodeId, Rloc16>,
    #[serde(default)]
    pub rlocs: OrderMap<NodeId, Ipv6Addr>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub omrs: OrderMap<NodeId, Vec<Ipv6Addr>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub duas: OrderMap<NodeId, Vec<Ipv6Addr>>,
    #[serde(default)]
    pub leader_aloc: Option<Ipv6Addr>,
    #[serde(default)]
    pub topology: OrderMap<NodeId, NodeInfo>,
    #[serde(default)]
    pub backbone: Option<Backbone>,
    #[serde(default)]
    pub domain_prefix: Option<Ipv6Prefix>,
    #[serde(default)]
    pub extra_vars: OrderMap<String, serde_json::Value>,
    #[serde(default)]
    pub env: OrderMap<String, String>,
    /// Where the document was loaded from.
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl TestInfo {
    /// Parse a test info document.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON or field values.
    pub fn from_json_str(json: &str) -> Result<Self, TestInfoError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a test info document.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be read, see also [`TestInfo::from_json_str`].
    pub fn load(path: &Path) -> Result<Self, TestInfoError> {
        let json = std::fs::read_to_string(path).map_err(|source| TestInfoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut info = Self::from_json_str(&json)?;
        info.source = Some(path.to_path_buf());
        debug!("loaded test info of {} from {}", info.testcase, path.display());
        Ok(info)
    }

    /// Path of the document, if it was loaded from a file.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The capture path, resolved against the directory of the document.
    #[must_use]
    pub fn pcap_path(&self) -> PathBuf {
        match self.source.as_deref().and_then(Path::parent) {
            Some(dir) if self.pcap.is_relative() => dir.join(&self.pcap),
            _ => self.pcap.clone(),
        }
    }

    /// Every node mentioned by the document, topology nodes first.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.topology.keys().copied().collect();
        for id in self
            .extaddrs
            .keys()
            .chain(self.ethaddrs.keys())
            .chain(self.ipaddrs.keys())
        {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    /// The name of a node: its topology name, or `NODE_<id>`.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> String {
        self.topology
            .get(&id)
            .and_then(|node| node.name.clone())
            .unwrap_or_else(|| format!("NODE_{id}"))
    }

    #[must_use]
    pub fn is_otbr(&self, id: NodeId) -> bool {
        self.topology.get(&id).is_some_and(|n| n.is_otbr)
    }

    #[must_use]
    pub fn is_host(&self, id: NodeId) -> bool {
        self.topology.get(&id).is_some_and(|n| n.is_host)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const INFO: &str = r#"{
        "testcase": "Cert_5_1_01_RouterAttach",
        "pcap": "Cert_5_1_01_RouterAttach.pcap",
        "extaddrs": {"1": "166e0a0000000001", "2": "166e0a0000000002"},
        "ethaddrs": {"3": "02:00:00:00:00:03"},
        "ipaddrs": {"1": ["fe80::146e:a00:0:1", "fd00:db8::ff:fe00:0"]},
        "rloc16s": {"1": "0x0000", "2": 1024},
        "omrs": {"3": "fd00:1234::1"},
        "duas": {"3": ["fd00:7d03::1", "fd00:7d03::2"]},
        "topology": {
            "1": {"name": "LEADER", "mode": "rdn"},
            "2": {"name": "ROUTER", "mode": "rdn", "allowlist": [1]},
            "3": {"is_otbr": true, "version": "1.2"}
        },
        "backbone": {"interface": "eth0", "prefix": "9101:dead:beef:cafe::/64"},
        "domain_prefix": "fd00:7d03::/64",
        "extra_vars": {"PBBR_ETH": "02:00:00:00:00:03"}
    }"#;

    #[test]
    fn parses_documents() {
        let info = TestInfo::from_json_str(INFO).unwrap();
        assert_eq!(info.testcase, "Cert_5_1_01_RouterAttach");
        assert_eq!(info.rloc16s[&1], Rloc16(0));
        assert_eq!(info.rloc16s[&2], Rloc16(0x400));
        assert_eq!(info.omrs[&3].len(), 1);
        assert_eq!(info.duas[&3].len(), 2);
        assert_eq!(info.node_ids(), vec![1, 2, 3]);
        assert_eq!(info.node_name(1), "LEADER");
        assert_eq!(info.node_name(3), "NODE_3");
        assert!(info.is_otbr(3));
        assert!(!info.is_host(3));
        assert_eq!(
            info.topology[&2].extra.get("allowlist"),
            Some(&serde_json::json!([1]))
        );
        assert_eq!(info.backbone.as_ref().map(|b| b.interface.as_str()), Some("eth0"));
    }

    #[test]
    fn resolves_capture_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_info.json");
        std::fs::write(&path, INFO).unwrap();
        let info = TestInfo::load(&path).unwrap();
        assert_eq!(info.source(), Some(path.as_path()));
        assert_eq!(info.pcap_path(), dir.path().join("Cert_5_1_01_RouterAttach.pcap"));
    }

    #[test]
    fn rejects_bad_values() {
        let bad = INFO.replace("\"0x0000\"", "\"0xzz\"");
        assert!(matches!(TestInfo::from_json_str(&bad), Err(TestInfoError::Json(_))));
        assert!(matches!(
            TestInfo::load(Path::new("/nonexistent/test_info.json")),
            Err(TestInfoError::Io { .. })
        ));
    }
}
