//! Explicit edit session over one invoice. Changes apply to a private draft
//! and only reach the caller through [`EditSession::finish`].

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::flatten::{ChainGroup, group_for_display};
use crate::model::{EntityNode, Expense, ExpenseType, InvoiceDocument, InvoiceStatus};
use crate::totals::{InvoiceTotals, form_duration, resolved_rate};

/// Pre-filled values for editing one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeForm {
    pub chain_index: usize,
    pub node_index: usize,
    pub name: String,
    pub duration: f64,
    pub rate: f64,
    pub rate_mode: String,
    /// Only populated for main entities.
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    original: InvoiceDocument,
    draft: InvoiceDocument,
    tax_rate: f64,
    dirty: bool,
}

fn check_amount(what: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(format!("{} must be a non-negative number", what)));
    }
    Ok(())
}

impl EditSession {
    pub fn begin(invoice: InvoiceDocument, tax_rate: f64) -> Self {
        debug!(invoice_id = %invoice.invoice_id, "edit session started");
        Self {
            draft: invoice.clone(),
            original: invoice,
            tax_rate,
            dirty: false,
        }
    }

    pub fn invoice(&self) -> &InvoiceDocument {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Form defaults for every node. An absent duration shows as 0 here even
    /// though it still bills one unit until the user sets it.
    pub fn form_values(&self) -> Vec<NodeForm> {
        let mut forms = Vec::new();
        for (chain_index, chain) in self.draft.invoice_items.iter().enumerate() {
            for (node_index, node) in chain.nodes().iter().enumerate() {
                let rate_mode = node
                    .rate_mode
                    .as_ref()
                    .or_else(|| node.project.as_ref().and_then(|p| p.rate_mode.as_ref()))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                forms.push(NodeForm {
                    chain_index,
                    node_index,
                    name: node.display_name().to_string(),
                    duration: form_duration(node),
                    rate: resolved_rate(node),
                    rate_mode,
                    expenses: if node_index == 0 { node.expenses.clone() } else { Vec::new() },
                });
            }
        }
        forms
    }

    fn node_mut(&mut self, chain_index: usize, node_index: usize) -> Result<&mut EntityNode> {
        self.draft
            .invoice_items
            .get_mut(chain_index)
            .and_then(|chain| chain.nodes_mut().get_mut(node_index))
            .ok_or_else(|| Error::not_found(format!("Line item {}.{}", chain_index, node_index)))
    }

    pub fn set_duration(&mut self, chain_index: usize, node_index: usize, duration: f64) -> Result<()> {
        check_amount("Duration", duration)?;
        self.node_mut(chain_index, node_index)?.duration = Some(duration);
        self.dirty = true;
        Ok(())
    }

    /// Sets the node's own rate, which takes precedence over its project rate
    /// unless it is zero.
    pub fn set_rate(&mut self, chain_index: usize, node_index: usize, rate: f64) -> Result<()> {
        check_amount("Rate", rate)?;
        self.node_mut(chain_index, node_index)?.rate_amount = Some(rate);
        self.dirty = true;
        Ok(())
    }

    /// Adds or replaces the main entity's expense of `kind`. A chain holds at
    /// most one expense per type.
    pub fn upsert_expense(
        &mut self,
        chain_index: usize,
        kind: ExpenseType,
        amount: f64,
        description: Option<String>,
    ) -> Result<()> {
        check_amount("Expense amount", amount)?;
        let main = self.node_mut(chain_index, 0)?;
        let description = description.filter(|d| !d.trim().is_empty());
        match main.expenses.iter_mut().find(|e| e.kind == kind) {
            Some(existing) => {
                existing.amount = Some(amount);
                existing.description = description;
            }
            None => main.expenses.push(Expense { kind, amount: Some(amount), description }),
        }
        self.dirty = true;
        Ok(())
    }

    /// Returns whether an expense of `kind` existed.
    pub fn remove_expense(&mut self, chain_index: usize, kind: ExpenseType) -> Result<bool> {
        let main = self.node_mut(chain_index, 0)?;
        let before = main.expenses.len();
        main.expenses.retain(|e| e.kind != kind);
        let removed = main.expenses.len() != before;
        self.dirty |= removed;
        Ok(removed)
    }

    pub fn set_invoice_date(&mut self, date: impl Into<String>) {
        self.draft.invoice_date = Some(date.into());
        self.dirty = true;
    }

    pub fn set_due_date(&mut self, date: impl Into<String>) {
        self.draft.due_date = Some(date.into());
        self.dirty = true;
    }

    pub fn set_show_hierarchy(&mut self, show: bool) {
        self.draft.show_project_hierarchy = show;
        self.dirty = true;
    }

    pub fn set_status(&mut self, status: InvoiceStatus) {
        self.draft.status = status;
        self.dirty = true;
    }

    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(&self.draft.invoice_items, self.draft.invoice_type, self.tax_rate)
    }

    pub fn groups(&self) -> Vec<ChainGroup<'_>> {
        group_for_display(
            &self.draft.invoice_items,
            self.draft.invoice_type,
            self.draft.show_project_hierarchy,
        )
    }

    /// Discards the draft.
    pub fn cancel(self) -> InvoiceDocument {
        debug!(invoice_id = %self.original.invoice_id, "edit session cancelled");
        self.original
    }

    /// The edited invoice with its total recomputed.
    pub fn finish(self) -> InvoiceDocument {
        let totals = self.totals();
        let mut invoice = self.draft;
        invoice.total_amount = totals.total_with_expenses;
        invoice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice() -> InvoiceDocument {
        serde_json::from_value(json!({
            "invoice_id": "INV-1",
            "invoice_type": "bulk",
            "total_amount": 999.0,
            "invoice_items": [
                [{"name": "Dev", "project": {"rate_amount": 100, "rate_mode": "hourly"}},
                 {"name": "Agency", "rate_amount": 20, "duration": 3}],
                [{"name": "Solo", "rate_amount": 50, "duration": 2}]
            ]
        }))
        .unwrap()
    }

    #[test]
    fn form_prefills_zero_duration_without_touching_totals() {
        let session = EditSession::begin(invoice(), 10.0);
        let forms = session.form_values();
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[0].duration, 0.0);
        assert_eq!(forms[0].rate, 100.0);
        assert_eq!(forms[0].rate_mode, "Hourly");
        assert_eq!(forms[1].duration, 3.0);

        // 100*1 + 20*3 + 50*2 = 260
        assert_eq!(session.totals().subtotal, 260.0);
        assert!(!session.is_dirty());
    }

    #[test]
    fn finish_recomputes_total_instead_of_trusting_storage() {
        let mut session = EditSession::begin(invoice(), 10.0);
        session.set_duration(0, 0, 2.0).unwrap();
        session.upsert_expense(0, ExpenseType::Travel, 40.0, Some("Taxi".into())).unwrap();
        let finished = session.finish();
        // (200 + 60 + 100) * 1.1 + 40
        assert_eq!(finished.total_amount, 436.0);
        assert_eq!(finished.invoice_items[0].main().duration, Some(2.0));
    }

    #[test]
    fn cancel_returns_the_untouched_original() {
        let mut session = EditSession::begin(invoice(), 10.0);
        session.set_rate(1, 0, 1.0).unwrap();
        session.set_show_hierarchy(false);
        assert!(session.is_dirty());
        let original = session.cancel();
        assert_eq!(original.invoice_items[1].main().rate_amount, Some(50.0));
        assert!(original.show_project_hierarchy);
        assert_eq!(original.total_amount, 999.0);
    }

    #[test]
    fn one_expense_per_type() {
        let mut session = EditSession::begin(invoice(), 10.0);
        session.upsert_expense(0, ExpenseType::Food, 10.0, None).unwrap();
        session.upsert_expense(0, ExpenseType::Food, 15.0, Some("Dinner".into())).unwrap();
        let expenses = &session.invoice().invoice_items[0].main().expenses;
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].amount(), 15.0);
        assert_eq!(expenses[0].description.as_deref(), Some("Dinner"));

        assert!(session.remove_expense(0, ExpenseType::Food).unwrap());
        assert!(!session.remove_expense(0, ExpenseType::Food).unwrap());
    }

    #[test]
    fn rejects_bad_numbers_and_unknown_positions() {
        let mut session = EditSession::begin(invoice(), 10.0);
        assert!(matches!(session.set_duration(0, 0, -1.0), Err(Error::Validation(_))));
        assert!(matches!(session.set_rate(0, 0, f64::NAN), Err(Error::Validation(_))));
        assert!(session.set_duration(5, 0, 1.0).unwrap_err().is_not_found());
        assert!(session.set_duration(0, 9, 1.0).unwrap_err().is_not_found());
        assert!(!session.is_dirty());
    }

    #[test]
    fn groups_follow_hierarchy_flag() {
        let mut session = EditSession::begin(invoice(), 10.0);
        assert_eq!(session.groups()[0].sub_entities.len(), 2);
        session.set_show_hierarchy(false);
        assert_eq!(session.groups()[0].sub_entities.len(), 1);
    }
}
