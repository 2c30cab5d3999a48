//! Document payload for the external PDF service.

use chrono::Local;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dates::format_date_for_api;
use crate::error::Result;
use crate::flatten::flatten_for_pdf;
use crate::model::{InvoiceDocument, Party};
use crate::totals::{TaxConfig, line_item_totals};
use crate::validate::validate_invoice;

pub const FOOTER: &str = "Thank you for your business!";
pub const FINANCE_CHARGE_NOTICE: &str = "A finance charge of 1.5% will be made on unpaid balances after 30 days.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyBlock {
    pub company: String,
    pub address: String,
    pub zip: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl PartyBlock {
    fn from_party(party: Option<&Party>, name_fallback: &str, address_fallback: &str) -> Self {
        Self {
            company: party.and_then(|p| p.name.clone()).unwrap_or_else(|| name_fallback.to_string()),
            address: party.and_then(|p| p.address.clone()).unwrap_or_else(|| address_fallback.to_string()),
            zip: party.map(|p| p.postal().to_string()).unwrap_or_default(),
            city: party.and_then(|p| p.city.clone()).unwrap_or_default(),
            country: party.and_then(|p| p.country.clone()).unwrap_or_default(),
            email: party.and_then(|p| p.email.clone()).unwrap_or_default(),
            phone: party.map(|p| p.contact_phone().to_string()).unwrap_or_default(),
            website: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub quantity: f64,
    pub description: String,
    pub tax: f64,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfDocument {
    pub document_title: String,
    pub currency: String,
    pub tax_notation: String,
    pub margin_top: u32,
    pub margin_right: u32,
    pub margin_left: u32,
    pub margin_bottom: u32,
    pub sender: PartyBlock,
    pub client: PartyBlock,
    pub invoice_number: String,
    pub invoice_date: String,
    pub due_date: String,
    pub products: Vec<Product>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub footer: String,
    pub notice: String,
}

/// Validates the invoice and flattens its chains into a priced document.
pub fn build_document(invoice: &InvoiceDocument, tax_percentage: f64, apply_tax_per_item: bool) -> Result<PdfDocument> {
    validate_invoice(invoice)?;

    let flattened = flatten_for_pdf(&invoice.invoice_items);
    for warning in &flattened.warnings {
        warn!(invoice_id = %invoice.invoice_id, "{}", warning);
    }
    let items = flattened.into_items()?;

    let currency = invoice
        .company
        .as_ref()
        .and_then(|c| c.project.as_ref())
        .and_then(|p| p.currency.clone())
        .or_else(|| items.first().map(|i| i.currency.clone()))
        .unwrap_or_else(|| "USD".to_string());

    let config = TaxConfig { tax_percentage, apply_tax_per_item, currency };
    let totals = line_item_totals(&items, &config);
    debug!(
        invoice_id = %invoice.invoice_id,
        items = items.len(),
        subtotal = totals.subtotal,
        total = totals.total,
        "built pdf document"
    );

    let today = Local::now().date_naive();
    let mut sender = PartyBlock::from_party(invoice.company.as_ref(), "Company Name", "Company Address");
    sender.website = Some(invoice.company.as_ref().and_then(|c| c.website.clone()).unwrap_or_default());

    Ok(PdfDocument {
        document_title: "INVOICE".to_string(),
        currency: totals.currency.clone(),
        tax_notation: "VAT".to_string(),
        margin_top: 25,
        margin_right: 25,
        margin_left: 25,
        margin_bottom: 25,
        sender,
        client: PartyBlock::from_party(invoice.client.as_ref(), "Client Name", "Client Address"),
        invoice_number: invoice.invoice_id.clone(),
        invoice_date: format_date_for_api(invoice.invoice_date.as_deref(), today),
        due_date: format_date_for_api(invoice.due_date.as_deref(), today),
        products: items
            .iter()
            .map(|item| Product {
                quantity: item.quantity,
                description: item.description.clone(),
                tax: 0.0,
                price: format!("{:.2}", item.price),
            })
            .collect(),
        subtotal: format!("{:.2}", totals.subtotal),
        tax: format!("{:.2}", totals.tax),
        total: format!("{:.2}", totals.total),
        footer: FOOTER.to_string(),
        notice: format!("{}\nTax: {}%", FINANCE_CHARGE_NOTICE, totals.tax_percentage),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn invoice(items: serde_json::Value) -> InvoiceDocument {
        serde_json::from_value(json!({
            "invoice_id": "INV-77",
            "client": {"id": 1, "name": "Client Co", "zip": "10001", "phone": "555"},
            "company": {"id": 2, "name": "Our Co", "website": "our.example"},
            "invoice_date": "07, Dec 2025",
            "due_date": "06, Jan 2026",
            "invoice_items": items
        }))
        .unwrap()
    }

    #[test]
    fn prices_and_totals_use_two_decimals() {
        let doc = build_document(
            &invoice(json!([[{"name": "Dev", "type1": "Consultant",
                "project": {"rate_amount": 12.5, "rate_mode": "Hourly", "currency": "EUR"}}]])),
            10.0,
            false,
        )
        .unwrap();

        assert_eq!(doc.invoice_number, "INV-77");
        assert_eq!(doc.currency, "EUR");
        assert_eq!(doc.products[0].quantity, 8.0);
        assert_eq!(doc.products[0].price, "12.50");
        assert_eq!(doc.subtotal, "100.00");
        assert_eq!(doc.tax, "10.00");
        assert_eq!(doc.total, "110.00");
        assert_eq!(doc.invoice_date, "07-12-2025");
        assert!(doc.notice.ends_with("Tax: 10%"));
        assert_eq!(doc.client.zip, "10001");
        assert_eq!(doc.sender.website.as_deref(), Some("our.example"));
        assert_eq!(doc.client.website, None);
    }

    #[test]
    fn serializes_with_service_field_names() {
        let doc = build_document(&invoice(json!([[{"name": "A", "rate_amount": 1}]])), 10.0, false).unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("invoiceNumber").is_some());
        assert!(value.get("documentTitle").is_some());
        assert!(value["client"].get("website").is_none());
    }

    #[test]
    fn all_zero_rates_is_no_valid_items() {
        let err = build_document(&invoice(json!([[{"name": "Free"}]])), 10.0, false).unwrap_err();
        assert!(matches!(err, Error::NoValidItems));
    }

    #[test]
    fn invalid_invoice_is_rejected_before_flattening() {
        let mut inv = invoice(json!([[{"name": "A", "rate_amount": 1}]]));
        inv.client = None;
        assert!(matches!(build_document(&inv, 10.0, false), Err(Error::Validation(_))));
    }
}
