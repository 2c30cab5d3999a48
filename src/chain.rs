//! Ingestion-time normalization of `invoice_items`.
//!
//! The backend usually sends an array of arrays, but some payloads carry a
//! bare node where a one-element chain was meant. Everything downstream works
//! on [`EntityChain`] only, so the shape is settled here and nowhere else.
//! A chain that cannot be read is dropped rather than failing the invoice.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{EntityChain, EntityNode};

impl TryFrom<Value> for EntityChain {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        chain_from_value(value)?.ok_or_else(|| Error::ChainShape("empty chain".to_string()))
    }
}

/// Turns one raw `invoice_items` entry into a chain.
///
/// Returns `Ok(None)` for an empty array, which carries nothing billable.
pub fn chain_from_value(value: Value) -> Result<Option<EntityChain>> {
    match value {
        Value::Array(raw_nodes) => {
            let mut nodes = Vec::with_capacity(raw_nodes.len());
            for (index, raw) in raw_nodes.into_iter().enumerate() {
                if !raw.is_object() {
                    return Err(Error::ChainShape(format!(
                        "node {} is {}, expected an object",
                        index,
                        kind_of(&raw)
                    )));
                }
                nodes.push(serde_json::from_value::<EntityNode>(raw)?);
            }
            Ok(EntityChain::new(nodes))
        }
        Value::Object(map) if map.contains_key("name") || map.contains_key("project") => {
            debug!("wrapping bare node into a single-node chain");
            let node: EntityNode = serde_json::from_value(Value::Object(map))?;
            Ok(Some(EntityChain::single(node)))
        }
        other => Err(Error::ChainShape(format!(
            "{} is neither a chain nor an entity node",
            kind_of(&other)
        ))),
    }
}

/// Normalizes a whole `invoice_items` array, preserving the order of the
/// chains it keeps. Empty and malformed chains are dropped with a warning, so
/// they contribute nothing to any total.
pub fn normalize_items(values: Vec<Value>) -> Vec<EntityChain> {
    let mut chains = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match chain_from_value(value) {
            Ok(Some(chain)) => chains.push(chain),
            Ok(None) => warn!(chain_index = index, "skipping empty chain"),
            Err(e) => warn!(chain_index = index, "skipping malformed chain: {}", e),
        }
    }
    chains
}

/// `deserialize_with` hook for every `invoice_items` field. A missing or null
/// field yields no chains.
pub fn deserialize_items<'de, D>(deserializer: D) -> std::result::Result<Vec<EntityChain>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(normalize_items(raw))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_arrays_become_chains_in_order() {
        let chains = normalize_items(vec![
            json!([{"name": "Dev"}, {"name": "Agency"}]),
            json!([{"name": "Solo"}]),
        ]);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].len(), 2);
        assert_eq!(chains[0].main().display_name(), "Dev");
        assert_eq!(chains[1].main().display_name(), "Solo");
    }

    #[test]
    fn bare_node_is_wrapped() {
        let chains = normalize_items(vec![json!({"name": "Bare", "project": {"rate_amount": 5}})]);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 1);
        assert_eq!(chains[0].main().display_name(), "Bare");
    }

    #[test]
    fn empty_chains_are_dropped() {
        let chains = normalize_items(vec![json!([]), json!([{"name": "Kept"}])]);
        assert_eq!(chains.len(), 1);
    }

    #[test]
    fn ambiguous_shapes_are_rejected_one_by_one() {
        assert!(matches!(chain_from_value(json!(42)), Err(Error::ChainShape(_))));
        assert!(matches!(chain_from_value(json!({"foo": 1})), Err(Error::ChainShape(_))));
        assert!(matches!(chain_from_value(json!([{"name": "ok"}, "oops"])), Err(Error::ChainShape(_))));
    }

    #[test]
    fn malformed_chains_are_skipped_not_fatal() {
        let chains = normalize_items(vec![
            json!(null),
            json!([{"name": "Kept", "rate_amount": 10}]),
            json!(42),
            json!([{"name": "ok"}, "oops"]),
            json!({"foo": 1}),
        ]);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].main().display_name(), "Kept");
    }

    #[test]
    fn single_chain_deserializes_through_try_from() {
        let chain: EntityChain = serde_json::from_value(json!([{"name": "A"}])).unwrap();
        assert_eq!(chain.main().display_name(), "A");
        assert!(serde_json::from_value::<EntityChain>(json!([])).is_err());
    }
}
