//! Building invoice documents from a fetched print view: one bulk invoice for
//! every chain, or one individual invoice per selected main entity.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use slug::slugify;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{EntityChain, InvoiceDocument, InvoiceStatus, InvoiceType, PrintView};
use crate::totals::{DEFAULT_TAX_RATE, InvoiceTotals};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainEntity {
    pub index: usize,
    pub name: String,
    pub country: String,
}

impl MainEntity {
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }
}

/// Entities that can be invoiced individually, one per chain.
pub fn main_entities(view: &PrintView) -> Vec<MainEntity> {
    view.invoice_items
        .iter()
        .enumerate()
        .map(|(index, chain)| MainEntity {
            index,
            name: chain.main().display_name().to_string(),
            country: chain.main().country_or_na().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySelection {
    All,
    Index(usize),
}

impl EntitySelection {
    /// `"all"`, a chain index, or empty (nothing selected).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::NoEntitySelected);
        }
        if input.eq_ignore_ascii_case("all") {
            return Ok(EntitySelection::All);
        }
        input
            .parse::<usize>()
            .map(EntitySelection::Index)
            .map_err(|_| Error::validation(format!("Invalid entity selection: {}", input)))
    }
}

fn random_suffix(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/// Short slug of an entity name: the part before the first comma.
pub fn entity_slug(name: &str) -> String {
    let short = name.split(',').next().unwrap_or("").trim();
    let slug = slugify(short);
    if slug.is_empty() { "entity".to_string() } else { slug }
}

pub fn bulk_invoice_id(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    format!("INV-{}-{}", now.timestamp_millis(), random_suffix(rng, 9))
}

/// Timestamp, slug, chain index and a random suffix: unique even for
/// identically named entities generated in the same millisecond.
pub fn individual_invoice_id(now: DateTime<Utc>, name: &str, index: usize, rng: &mut impl Rng) -> String {
    format!(
        "INV-{}-IND-{}-{}-{}",
        now.timestamp_millis(),
        entity_slug(name),
        index,
        random_suffix(rng, 6)
    )
}

pub fn build_bulk(view: &PrintView, show_hierarchy: bool) -> InvoiceDocument {
    let totals = InvoiceTotals::compute(&view.invoice_items, InvoiceType::Bulk, DEFAULT_TAX_RATE);
    InvoiceDocument {
        invoice_id: bulk_invoice_id(Utc::now(), &mut rand::thread_rng()),
        invoice_type: InvoiceType::Bulk,
        template_id: view.template_id.clone(),
        invoice_items: view.invoice_items.clone(),
        invoice_date: view.invoice_date.clone(),
        due_date: view.due_date.clone(),
        show_project_hierarchy: show_hierarchy,
        total_amount: totals.total_with_expenses,
        client: view.client.clone(),
        company: view.company.clone(),
        entity_name: None,
        client_name: view.client.as_ref().and_then(|c| c.name.clone()),
        status: InvoiceStatus::Draft,
        message: None,
    }
}

fn individual_document(
    view: &PrintView,
    chain: &EntityChain,
    index: usize,
    show_hierarchy: bool,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> InvoiceDocument {
    let items = vec![chain.clone()];
    let totals = InvoiceTotals::compute(&items, InvoiceType::Individual, DEFAULT_TAX_RATE);
    let label = chain.main().entity_label();

    InvoiceDocument {
        invoice_id: individual_invoice_id(now, chain.main().display_name(), index, rng),
        invoice_type: InvoiceType::Individual,
        template_id: view.template_id.clone(),
        invoice_items: items,
        invoice_date: view.invoice_date.clone(),
        due_date: view.due_date.clone(),
        show_project_hierarchy: show_hierarchy,
        total_amount: totals.total_with_expenses,
        client: view.client.clone(),
        company: view.company.clone(),
        entity_name: Some(label.clone()),
        client_name: Some(label),
        status: InvoiceStatus::Draft,
        message: None,
    }
}

/// One individual invoice per selected chain, each billing only that chain.
pub fn split_individual(
    view: &PrintView,
    selection: EntitySelection,
    show_hierarchy: bool,
) -> Result<Vec<InvoiceDocument>> {
    let now = Utc::now();
    let mut rng = rand::thread_rng();

    let invoices = match selection {
        EntitySelection::All => view
            .invoice_items
            .iter()
            .enumerate()
            .map(|(index, chain)| individual_document(view, chain, index, show_hierarchy, now, &mut rng))
            .collect(),
        EntitySelection::Index(index) => {
            let chain = view
                .invoice_items
                .get(index)
                .ok_or_else(|| Error::not_found(format!("Entity {}", index)))?;
            vec![individual_document(view, chain, index, show_hierarchy, now, &mut rng)]
        }
    };

    info!(count = invoices.len(), "generated individual invoices");
    Ok(invoices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn view() -> PrintView {
        serde_json::from_value(json!({
            "template_id": 3,
            "client": {"id": 1, "name": "Client Co"},
            "company": {"id": 2, "name": "Our Co"},
            "invoice_date": "07, Dec 2025",
            "due_date": "06, Jan 2026",
            "invoice_items": [
                [{"name": "Acme", "country": "India", "rate_amount": 100, "duration": 2},
                 {"name": "Broker", "rate_amount": 50}],
                [{"name": "Acme", "country": "India", "project": {"rate_amount": 10}}],
                [{"name": "Zed Labs"}]
            ]
        }))
        .unwrap()
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(EntitySelection::parse("all").unwrap(), EntitySelection::All);
        assert_eq!(EntitySelection::parse(" 2 ").unwrap(), EntitySelection::Index(2));
        assert!(matches!(EntitySelection::parse(""), Err(Error::NoEntitySelected)));
        assert!(matches!(EntitySelection::parse("first"), Err(Error::Validation(_))));
    }

    #[test]
    fn lists_main_entities_with_country_fallback() {
        let entities = main_entities(&view());
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].label(), "Acme, India");
        assert_eq!(entities[2].label(), "Zed Labs, N/A");
    }

    #[test]
    fn all_produces_one_invoice_per_chain_with_unique_ids() {
        let invoices = split_individual(&view(), EntitySelection::All, true).unwrap();
        assert_eq!(invoices.len(), 3);

        let ids: HashSet<_> = invoices.iter().map(|i| i.invoice_id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(invoices[0].invoice_id.contains("-IND-acme-0-"));
        assert!(invoices[1].invoice_id.contains("-IND-acme-1-"));

        for invoice in &invoices {
            assert_eq!(invoice.invoice_type, InvoiceType::Individual);
            assert_eq!(invoice.invoice_items.len(), 1);
        }
        assert_eq!(invoices[0].entity_name.as_deref(), Some("Acme, India"));
    }

    #[test]
    fn individual_total_covers_whole_chain() {
        let invoices = split_individual(&view(), EntitySelection::Index(0), false).unwrap();
        assert_eq!(invoices.len(), 1);
        // (2 * 100 + 1 * 50) plus 10% tax
        assert_eq!(invoices[0].total_amount, 275.0);
        assert!(!invoices[0].show_project_hierarchy);
    }

    #[test]
    fn out_of_range_selection_is_not_found() {
        let err = split_individual(&view(), EntitySelection::Index(9), true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn bulk_covers_all_chains() {
        let doc = build_bulk(&view(), true);
        assert_eq!(doc.invoice_type, InvoiceType::Bulk);
        assert_eq!(doc.invoice_items.len(), 3);
        // 250 + 10 + 0, plus 10% tax
        assert_eq!(doc.total_amount, 286.0);
        assert!(doc.invoice_id.starts_with("INV-"));
    }

    #[test]
    fn slug_uses_part_before_comma() {
        assert_eq!(entity_slug("Acme Corp, India"), "acme-corp");
        assert_eq!(entity_slug("  "), "entity");
    }
}
