use serde::Serialize;

use crate::flatten::LineItem;
use crate::model::{EntityChain, EntityNode, InvoiceType};

pub const DEFAULT_TAX_RATE: f64 = 10.0;

/// Rounds a currency amount to cents.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Node rate first, then the project's, then zero. A zero or negative rate
/// counts as unset, so a cleared node rate falls back to the project.
pub fn resolved_rate(node: &EntityNode) -> f64 {
    let positive = |rate: Option<f64>| rate.filter(|r| *r > 0.0);
    positive(node.rate_amount)
        .or_else(|| positive(node.project.as_ref().and_then(|p| p.rate_amount)))
        .unwrap_or(0.0)
}

/// Duration used for line totals. An untouched node bills one unit.
pub fn line_duration(node: &EntityNode) -> f64 {
    node.duration.unwrap_or(1.0)
}

/// Duration pre-filled into an edit form. Distinct from [`line_duration`]:
/// the form starts empty, the bill does not.
pub fn form_duration(node: &EntityNode) -> f64 {
    node.duration.unwrap_or(0.0)
}

pub fn line_total(node: &EntityNode) -> f64 {
    line_duration(node) * resolved_rate(node)
}

pub fn chain_total(chain: &EntityChain) -> f64 {
    chain.nodes().iter().map(line_total).sum()
}

/// Sum of line totals. An individual invoice bills every node of its single
/// chain; anything else bills every node of every chain.
pub fn subtotal(items: &[EntityChain], invoice_type: InvoiceType) -> f64 {
    if invoice_type == InvoiceType::Individual && items.len() == 1 {
        return chain_total(&items[0]);
    }
    items.iter().map(chain_total).sum()
}

pub fn tax(subtotal: f64, tax_rate: f64) -> f64 {
    subtotal * tax_rate / 100.0
}

/// Expenses attached to the main entity of a chain. Sub-entity expenses are
/// not billed.
pub fn entity_expense_total(chain: &EntityChain) -> f64 {
    chain.main().expenses.iter().map(|e| e.amount()).sum()
}

pub fn total_all_expenses(items: &[EntityChain]) -> f64 {
    items.iter().map(entity_expense_total).sum()
}

/// Every figure shown for an invoice. The preview headline and the exported
/// document disagree on whether expenses belong in the total, so both are
/// carried under their own names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax: f64,
    pub expenses: f64,
    pub total_without_expenses: f64,
    pub total_with_expenses: f64,
}

impl InvoiceTotals {
    pub fn compute(items: &[EntityChain], invoice_type: InvoiceType, tax_rate: f64) -> Self {
        let subtotal = subtotal(items, invoice_type);
        let tax = tax(subtotal, tax_rate);
        let expenses = total_all_expenses(items);
        Self {
            subtotal: round2(subtotal),
            tax_rate,
            tax: round2(tax),
            expenses: round2(expenses),
            total_without_expenses: round2(subtotal + tax),
            total_with_expenses: round2(subtotal + tax + expenses),
        }
    }
}

// ==========================================
// Flat Line Items (external PDF service)
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct TaxConfig {
    pub tax_percentage: f64,
    /// Tax each line separately instead of the subtotal. Only the
    /// external-service document honors it.
    pub apply_tax_per_item: bool,
    pub currency: String,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            tax_percentage: DEFAULT_TAX_RATE,
            apply_tax_per_item: false,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub tax_percentage: f64,
}

pub fn line_item_totals(items: &[LineItem], config: &TaxConfig) -> LineItemTotals {
    let amount = |item: &LineItem| item.price * item.quantity;
    let subtotal: f64 = items.iter().map(amount).sum();
    let total_tax = if config.apply_tax_per_item {
        items.iter().map(|i| tax(amount(i), config.tax_percentage)).sum()
    } else {
        tax(subtotal, config.tax_percentage)
    };

    LineItemTotals {
        subtotal: round2(subtotal),
        tax: round2(total_tax),
        total: round2(subtotal + total_tax),
        currency: config.currency.clone(),
        tax_percentage: config.tax_percentage,
    }
}
