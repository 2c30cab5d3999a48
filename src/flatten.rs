//! Reshaping chains for the two consumers: flat line items for the external
//! PDF service, and grouped chains for on-screen and rendered documents.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{EntityChain, EntityNode, InvoiceType, RateMode};
use crate::totals::resolved_rate;

pub const HIERARCHY_SEPARATOR: &str = " → ";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemMeta {
    pub item_name: String,
    pub item_type: Option<String>,
    pub chain_index: usize,
    pub item_index: usize,
    pub rate_mode: String,
    pub original_currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub quantity: f64,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub tax: f64,
    pub metadata: LineItemMeta,
}

/// Output of [`flatten_for_pdf`]. Skipped nodes are reported as warnings.
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub items: Vec<LineItem>,
    pub warnings: Vec<String>,
}

impl Flattened {
    /// Line items, or [`Error::NoValidItems`] if every node was skipped.
    pub fn into_items(self) -> Result<Vec<LineItem>> {
        if self.items.is_empty() {
            return Err(Error::NoValidItems);
        }
        Ok(self.items)
    }
}

/// Units billed per line for the external service, keyed on rate mode.
pub fn quantity_for(mode: &RateMode) -> f64 {
    match mode {
        RateMode::Hourly => 8.0,
        RateMode::Daily => 22.0,
        _ => 1.0,
    }
}

fn resolved_mode(node: &EntityNode) -> RateMode {
    node.rate_mode
        .clone()
        .or_else(|| node.project.as_ref().and_then(|p| p.rate_mode.clone()))
        .unwrap_or(RateMode::Fixed)
}

fn segment(node: &EntityNode) -> String {
    format!("{} ({})", node.display_name(), node.category())
}

/// `"A (Consultant) → B (Company)\n<address>"` for the node at `item_index`.
pub fn hierarchy_description(chain: &EntityChain, item_index: usize) -> String {
    let path = chain.nodes()[..=item_index]
        .iter()
        .map(segment)
        .collect::<Vec<_>>()
        .join(HIERARCHY_SEPARATOR);
    let node = &chain.nodes()[item_index];
    format!("{}\n{}", path, node.address.as_deref().unwrap_or("No address"))
}

pub fn flatten_for_pdf(chains: &[EntityChain]) -> Flattened {
    let mut out = Flattened::default();

    for (chain_index, chain) in chains.iter().enumerate() {
        for (item_index, node) in chain.nodes().iter().enumerate() {
            let rate = resolved_rate(node);
            if rate <= 0.0 {
                let message = format!("Invalid rate for {}: {}", node.display_name(), rate);
                warn!(chain_index, item_index, "{}", message);
                out.warnings.push(message);
                continue;
            }

            let mode = resolved_mode(node);
            let currency = node.currency().unwrap_or("USD").to_string();
            out.items.push(LineItem {
                quantity: quantity_for(&mode),
                description: hierarchy_description(chain, item_index),
                price: rate,
                currency: currency.clone(),
                tax: 0.0,
                metadata: LineItemMeta {
                    item_name: node.display_name().to_string(),
                    item_type: node.type1.clone(),
                    chain_index,
                    item_index,
                    rate_mode: mode.as_str().to_string(),
                    original_currency: currency,
                },
            });
        }
    }

    debug!(count = out.items.len(), "flattened line items");
    out
}

// ==========================================
// Grouped Display
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct ChainGroup<'a> {
    /// 1-based position used for row numbering.
    pub index: usize,
    pub chain_index: usize,
    pub main_entity: &'a EntityNode,
    pub sub_entities: &'a [EntityNode],
    pub show_hierarchy: bool,
}

impl<'a> ChainGroup<'a> {
    /// Nodes rendered as indented lines under the main entity.
    pub fn sub_entity_lines(&self) -> &'a [EntityNode] {
        let nodes: &'a [EntityNode] = self.sub_entities;
        if self.show_hierarchy && !nodes.is_empty() {
            &nodes[1..]
        } else {
            &[]
        }
    }
}

/// Groups chains for display, one group per chain in input order.
///
/// A single-chain individual invoice keeps its full chain as the group value
/// whatever the hierarchy flag; otherwise a hidden hierarchy narrows each
/// group to its main entity.
pub fn group_for_display(
    chains: &[EntityChain],
    invoice_type: InvoiceType,
    show_hierarchy: bool,
) -> Vec<ChainGroup<'_>> {
    if invoice_type == InvoiceType::Individual && chains.len() == 1 {
        let chain = &chains[0];
        return vec![ChainGroup {
            index: 1,
            chain_index: 0,
            main_entity: chain.main(),
            sub_entities: chain.nodes(),
            show_hierarchy,
        }];
    }

    chains
        .iter()
        .enumerate()
        .map(|(chain_index, chain)| ChainGroup {
            index: chain_index + 1,
            chain_index,
            main_entity: chain.main(),
            sub_entities: if show_hierarchy { chain.nodes() } else { &chain.nodes()[..1] },
            show_hierarchy,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;

    fn node(name: &str, kind: &str, rate: f64, mode: &str) -> EntityNode {
        EntityNode {
            name: Some(name.into()),
            type1: Some(kind.into()),
            project: Some(Project {
                rate_amount: Some(rate),
                rate_mode: Some(RateMode::parse(mode)),
                currency: Some("INR".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn chain(nodes: Vec<EntityNode>) -> EntityChain {
        EntityChain::new(nodes).unwrap()
    }

    #[test]
    fn quantity_follows_rate_mode() {
        let items = flatten_for_pdf(&[chain(vec![
            node("A", "Consultant", 10.0, "hourly"),
            node("B", "Company", 10.0, "Daily"),
            node("C", "Client", 10.0, "Monthly"),
            node("D", "Vendor", 10.0, "Milestone"),
        ])])
        .into_items()
        .unwrap();
        let quantities: Vec<f64> = items.iter().map(|i| i.quantity).collect();
        assert_eq!(quantities, vec![8.0, 22.0, 1.0, 1.0]);
        assert_eq!(items[0].currency, "INR");
    }

    #[test]
    fn description_walks_hierarchy_to_current_node() {
        let mut second = node("Agency", "Company", 5.0, "fixed");
        second.address = Some("12 Main St".into());
        let items = flatten_for_pdf(&[chain(vec![node("Dev", "Consultant", 5.0, "fixed"), second])]).items;
        assert_eq!(items[0].description, "Dev (Consultant)\nNo address");
        assert_eq!(items[1].description, "Dev (Consultant) → Agency (Company)\n12 Main St");
        assert_eq!(items[1].metadata.item_index, 1);
    }

    #[test]
    fn zero_rate_nodes_are_skipped_and_reported() {
        let flattened = flatten_for_pdf(&[chain(vec![node("Free", "Consultant", 0.0, "fixed")])]);
        assert!(flattened.items.is_empty());
        assert_eq!(flattened.warnings.len(), 1);
        assert!(matches!(flattened.into_items(), Err(Error::NoValidItems)));
        assert!(matches!(flatten_for_pdf(&[]).into_items(), Err(Error::NoValidItems)));
    }

    #[test]
    fn groups_keep_input_order() {
        let chains = vec![
            chain(vec![node("First", "C", 1.0, "fixed"), node("Up", "C", 1.0, "fixed")]),
            chain(vec![node("Second", "C", 1.0, "fixed")]),
            chain(vec![node("Third", "C", 1.0, "fixed")]),
        ];
        let groups = group_for_display(&chains, InvoiceType::Bulk, true);
        let names: Vec<_> = groups.iter().map(|g| g.main_entity.display_name()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(groups.iter().map(|g| g.index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(groups[0].sub_entities.len(), 2);
        assert_eq!(groups[0].sub_entity_lines()[0].display_name(), "Up");
    }

    #[test]
    fn hidden_hierarchy_narrows_to_main_entity() {
        let chains = vec![
            chain(vec![node("A", "C", 1.0, "fixed"), node("B", "C", 1.0, "fixed")]),
            chain(vec![node("C", "C", 1.0, "fixed"), node("D", "C", 1.0, "fixed")]),
        ];
        for group in group_for_display(&chains, InvoiceType::Bulk, false) {
            assert_eq!(group.sub_entities.len(), 1);
            assert!(std::ptr::eq(&group.sub_entities[0], group.main_entity));
            assert!(group.sub_entity_lines().is_empty());
        }
    }

    #[test]
    fn single_individual_chain_keeps_full_chain() {
        let chains = vec![chain(vec![node("A", "C", 1.0, "fixed"), node("B", "C", 1.0, "fixed")])];
        let hidden = group_for_display(&chains, InvoiceType::Individual, false);
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].sub_entities.len(), 2);
        assert!(hidden[0].sub_entity_lines().is_empty());

        let shown = group_for_display(&chains, InvoiceType::Individual, true);
        assert_eq!(shown[0].sub_entity_lines().len(), 1);
    }
}
