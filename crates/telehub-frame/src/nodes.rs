//! Per-node encoding facts.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Deserializer, Serialize};

use crate::datacode::Datacode;

/// How the values of one node's frames are encoded.
///
/// Serializes in the configuration shape: `{"datacode": "h"}` or
/// `{"datacodes": ["h", "L"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeEncoding {
    /// One datacode applied to every value.
    #[serde(rename = "datacode")]
    Single(Datacode),
    /// One datacode per value, in order.
    #[serde(rename = "datacodes")]
    PerValue(Vec<Datacode>),
}

impl NodeEncoding {
    /// Total payload bytes a per-value list requires.
    pub fn required_len(&self) -> Option<usize> {
        match self {
            NodeEncoding::Single(_) => None,
            NodeEncoding::PerValue(codes) => Some(codes.iter().map(|c| c.width()).sum()),
        }
    }
}

/// Source of node encoding descriptors consulted while decoding.
pub trait CodecFacts: Send + Sync {
    /// The encoding declared for `node`, if any.
    fn node_encoding(&self, node: u32) -> Option<NodeEncoding>;
}

/// Static table of node encodings, usually loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NodeTable {
    nodes: BTreeMap<u32, NodeEncoding>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a single datacode for every value of `node`.
    pub fn with_datacode(mut self, node: u32, code: Datacode) -> Self {
        self.nodes.insert(node, NodeEncoding::Single(code));
        self
    }

    /// Declare one datacode per value of `node`.
    pub fn with_datacodes(mut self, node: u32, codes: Vec<Datacode>) -> Self {
        self.nodes.insert(node, NodeEncoding::PerValue(codes));
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl CodecFacts for NodeTable {
    fn node_encoding(&self, node: u32) -> Option<NodeEncoding> {
        self.nodes.get(&node).cloned()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeList {
    List(Vec<Datacode>),
    Joined(String),
}

#[derive(Deserialize)]
struct NodeEntry {
    #[serde(default)]
    datacode: Option<Datacode>,
    #[serde(default)]
    datacodes: Option<CodeList>,
}

impl<'de> Deserialize<'de> for NodeTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<u32, NodeEntry>::deserialize(deserializer)?;
        let mut nodes = BTreeMap::new();

        for (node, entry) in entries {
            let encoding = match (entry.datacodes, entry.datacode) {
                (Some(list), _) => {
                    let codes = match list {
                        CodeList::List(codes) => codes,
                        CodeList::Joined(text) => text
                            .split(',')
                            .map(|s| s.trim())
                            .filter(|s| !s.is_empty())
                            .map(str::parse)
                            .collect::<Result<Vec<Datacode>, _>>()
                            .map_err(serde::de::Error::custom)?,
                    };
                    if codes.is_empty() || codes.iter().any(|c| c.is_raw()) {
                        return Err(serde::de::Error::custom(format!(
                            "node {node}: datacodes must be a non-empty list of binary datacodes"
                        )));
                    }
                    NodeEncoding::PerValue(codes)
                }
                (None, Some(code)) => NodeEncoding::Single(code),
                (None, None) => continue,
            };
            nodes.insert(node, encoding);
        }

        Ok(Self { nodes })
    }
}

/// A [`NodeTable`] shared between readers and replaced wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct SharedNodeTable {
    inner: Arc<RwLock<NodeTable>>,
}

impl SharedNodeTable {
    pub fn new(table: NodeTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Swap in a new table. Readers see it on their next frame.
    pub fn replace(&self, table: NodeTable) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = table;
    }

    /// Copy of the current table.
    pub fn snapshot(&self) -> NodeTable {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CodecFacts for SharedNodeTable {
    fn node_encoding(&self, node: u32) -> Option<NodeEncoding> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .node_encoding(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_value_required_len() {
        let enc = NodeEncoding::PerValue(vec![Datacode::I16, Datacode::I16, Datacode::U32]);
        assert_eq!(enc.required_len(), Some(8));
        assert_eq!(NodeEncoding::Single(Datacode::I16).required_len(), None);
    }

    #[test]
    fn serializes_in_config_shape() {
        let table = NodeTable::new()
            .with_datacode(5, Datacode::I8)
            .with_datacodes(10, vec![Datacode::I16, Datacode::U32]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"5":{"datacode":"b"},"10":{"datacodes":["h","L"]}}"#);
        let back: NodeTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn deserializes_config_section() {
        let table: NodeTable = serde_json::from_str(
            r#"{
                "10": { "datacodes": ["h", "h", "L"] },
                "11": { "datacodes": "b,B" },
                "5":  { "datacode": "b" },
                "6":  { "datacode": 0 },
                "7":  {}
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(
            table.node_encoding(10),
            Some(NodeEncoding::PerValue(vec![
                Datacode::I16,
                Datacode::I16,
                Datacode::U32
            ]))
        );
        assert_eq!(
            table.node_encoding(11),
            Some(NodeEncoding::PerValue(vec![Datacode::I8, Datacode::U8]))
        );
        assert_eq!(
            table.node_encoding(5),
            Some(NodeEncoding::Single(Datacode::I8))
        );
        assert_eq!(
            table.node_encoding(6),
            Some(NodeEncoding::Single(Datacode::Raw))
        );
        assert_eq!(table.node_encoding(7), None);
    }

    #[test]
    fn per_value_list_wins_over_single() {
        let table: NodeTable =
            serde_json::from_str(r#"{ "3": { "datacode": "h", "datacodes": ["B"] } }"#).unwrap();
        assert_eq!(
            table.node_encoding(3),
            Some(NodeEncoding::PerValue(vec![Datacode::U8]))
        );
    }

    #[test]
    fn rejects_raw_in_per_value_list() {
        let result = serde_json::from_str::<NodeTable>(r#"{ "3": { "datacodes": ["h", "0"] } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn shared_table_replacement_is_visible() {
        let shared = SharedNodeTable::new(NodeTable::new());
        let facts: Arc<dyn CodecFacts> = Arc::new(shared.clone());
        assert_eq!(facts.node_encoding(1), None);

        shared.replace(NodeTable::new().with_datacode(1, Datacode::U16));
        assert_eq!(
            facts.node_encoding(1),
            Some(NodeEncoding::Single(Datacode::U16))
        );
        assert_eq!(shared.snapshot().len(), 1);
    }
}
