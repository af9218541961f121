// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Builder for test info documents.

use serde_json::{Map, Value, json};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct TestInfoBuilder {
    doc: Map<String, Value>,
}

impl TestInfoBuilder {
    /// A document for `testcase`, whose capture is `<testcase>.json` next to
    /// it.
    #[must_use]
    pub fn new(testcase: &str) -> Self {
        let mut doc = Map::new();
        doc.insert("testcase".to_string(), Value::from(testcase));
        doc.insert("pcap".to_string(), Value::from(format!("{testcase}.json")));
        TestInfoBuilder { doc }
    }

    /// File name of the capture.
    #[must_use]
    pub fn pcap_name(&self) -> String {
        self.doc
            .get("pcap")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn entry(&mut self, table: &str) -> &mut Map<String, Value> {
        let value = self
            .doc
            .entry(table.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !value.is_object() {
            *value = Value::Object(Map::new());
        }
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn set(mut self, table: &str, id: u32, value: Value) -> Self {
        self.entry(table).insert(id.to_string(), value);
        self
    }

    /// A node of the topology with its extended address.
    #[must_use]
    pub fn node(self, id: u32, name: &str, extaddr: &str) -> Self {
        self.set("topology", id, json!({ "name": name }))
            .set("extaddrs", id, Value::from(extaddr))
    }

    /// A border router node, with its ethernet address.
    #[must_use]
    pub fn otbr(self, id: u32, name: &str, extaddr: &str, ethaddr: &str) -> Self {
        self.set("topology", id, json!({ "name": name, "is_otbr": true }))
            .set("extaddrs", id, Value::from(extaddr))
            .set("ethaddrs", id, Value::from(ethaddr))
    }

    #[must_use]
    pub fn ipaddrs(self, id: u32, addrs: &[&str]) -> Self {
        self.set("ipaddrs", id, json!(addrs))
    }

    #[must_use]
    pub fn rloc16(self, id: u32, rloc16: u16) -> Self {
        self.set("rloc16s", id, Value::from(format!("0x{rloc16:04x}")))
    }

    #[must_use]
    pub fn rloc(self, id: u32, addr: &str) -> Self {
        self.set("rlocs", id, Value::from(addr))
    }

    #[must_use]
    pub fn mleid(self, id: u32, addr: &str) -> Self {
        self.set("mleids", id, Value::from(addr))
    }

    #[must_use]
    pub fn leader_aloc(mut self, addr: &str) -> Self {
        self.doc.insert("leader_aloc".to_string(), Value::from(addr));
        self
    }

    #[must_use]
    pub fn domain_prefix(mut self, prefix: &str) -> Self {
        self.doc.insert("domain_prefix".to_string(), Value::from(prefix));
        self
    }

    #[must_use]
    pub fn backbone(mut self, interface: &str, prefix: &str) -> Self {
        self.doc.insert(
            "backbone".to_string(),
            json!({ "interface": interface, "prefix": prefix }),
        );
        self
    }

    #[must_use]
    pub fn extra_var(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.entry("extra_vars").insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.doc.clone()).to_string()
    }

    /// Write the document.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be written.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_json())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_documents() {
        let info = TestInfoBuilder::new("Cert_5_1_01_RouterAttach")
            .node(1, "LEADER", "166e0a0000000001")
            .node(2, "ROUTER", "166e0a0000000002")
            .rloc16(2, 0x400)
            .extra_var("SEQ", 3);
        let doc: Value = serde_json::from_str(&info.to_json()).unwrap();
        assert_eq!(doc["pcap"], json!("Cert_5_1_01_RouterAttach.json"));
        assert_eq!(doc["topology"]["2"]["name"], json!("ROUTER"));
        assert_eq!(doc["rloc16s"]["2"], json!("0x0400"));
        assert_eq!(doc["extra_vars"]["SEQ"], json!(3));
    }
}
