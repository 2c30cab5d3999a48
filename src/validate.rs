use crate::dates::parse_any_date;
use crate::error::{Error, Result};
use crate::model::InvoiceDocument;

/// Checks that an invoice carries everything a rendered document needs.
/// All problems are collected into one [`Error::Validation`].
pub fn validate_invoice(doc: &InvoiceDocument) -> Result<()> {
    let mut errors = Vec::new();

    if !doc.client.as_ref().is_some_and(|c| c.has_id()) {
        errors.push("Client information missing".to_string());
    }
    if !doc.company.as_ref().is_some_and(|c| c.has_id()) {
        errors.push("Company information missing".to_string());
    }
    if doc.invoice_items.is_empty() {
        errors.push("No invoice items found".to_string());
    }

    let invoice_date = doc.invoice_date.as_deref().filter(|s| !s.trim().is_empty());
    let due_date = doc.due_date.as_deref().filter(|s| !s.trim().is_empty());
    if invoice_date.is_none() {
        errors.push("Invoice date missing".to_string());
    }
    if due_date.is_none() {
        errors.push("Due date missing".to_string());
    }

    if let (Some(issued), Some(due)) = (invoice_date, due_date) {
        let issued = parse_any_date(issued);
        let due = parse_any_date(due);
        if issued.is_none() {
            errors.push("Invalid invoice date format".to_string());
        }
        if due.is_none() {
            errors.push("Invalid due date format".to_string());
        }
        if let (Some(issued), Some(due)) = (issued, due) {
            if due < issued {
                errors.push("Due date cannot be before invoice date".to_string());
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(Error::Validation(errors)) }
}
