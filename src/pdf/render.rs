//! Local rendering: invoice → Tera → Typst source → `typst compile`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tera::{Context, Tera, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::flatten::group_for_display;
use crate::model::{EntityNode, InvoiceDocument, Party};
use crate::totals::{InvoiceTotals, chain_total, entity_expense_total, line_duration, line_total, resolved_rate};

const TEMPLATE_NAME: &str = "invoice.tera";
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/invoice.tera");

/// Escapes a value for use inside a Typst string literal.
fn typst_str(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    Ok(Value::String(out))
}

#[derive(Serialize)]
struct PartyView {
    name: String,
    address: String,
    city_line: String,
    email: String,
    phone: String,
}

impl PartyView {
    fn new(party: Option<&Party>) -> Self {
        let city_line = party
            .map(|p| {
                [p.city.as_deref().unwrap_or(""), p.postal(), p.country.as_deref().unwrap_or("")]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        Self {
            name: party.and_then(|p| p.name.clone()).unwrap_or_default(),
            address: party.and_then(|p| p.address.clone()).unwrap_or_default(),
            city_line,
            email: party.and_then(|p| p.email.clone()).unwrap_or_default(),
            phone: party.map(|p| p.contact_phone().to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct LineView {
    name: String,
    category: String,
    duration: String,
    rate: String,
    amount: String,
}

impl LineView {
    fn new(node: &EntityNode, currency: &str) -> Self {
        Self {
            name: node.display_name().to_string(),
            category: node.category().to_string(),
            duration: format!("{}", line_duration(node)),
            rate: money(currency, resolved_rate(node)),
            amount: money(currency, line_total(node)),
        }
    }
}

#[derive(Serialize)]
struct ExpenseView {
    label: String,
    amount: String,
}

#[derive(Serialize)]
struct GroupView {
    index: usize,
    main: LineView,
    country: String,
    sub_lines: Vec<LineView>,
    expenses: Vec<ExpenseView>,
}

#[derive(Serialize)]
struct TotalsView {
    subtotal: String,
    tax_rate: String,
    tax: String,
    expenses: String,
    has_expenses: bool,
    total: String,
}

#[derive(Serialize)]
struct RenderContext {
    invoice_number: String,
    invoice_id: String,
    invoice_type: &'static str,
    invoice_date: String,
    due_date: String,
    status: &'static str,
    billed_to: String,
    company: PartyView,
    client: PartyView,
    groups: Vec<GroupView>,
    totals: TotalsView,
}

fn money(currency: &str, amount: f64) -> String {
    format!("{} {:.2}", currency, amount)
}

fn invoice_currency(invoice: &InvoiceDocument) -> String {
    invoice
        .company
        .as_ref()
        .and_then(|c| c.project.as_ref())
        .and_then(|p| p.currency.clone())
        .or_else(|| invoice.invoice_items.first().and_then(|c| c.main().currency().map(str::to_string)))
        .unwrap_or_else(|| "USD".to_string())
}

fn build_context(invoice: &InvoiceDocument, tax_rate: f64) -> RenderContext {
    let currency = invoice_currency(invoice);
    let totals = InvoiceTotals::compute(&invoice.invoice_items, invoice.invoice_type, tax_rate);

    let groups = group_for_display(&invoice.invoice_items, invoice.invoice_type, invoice.show_project_hierarchy)
        .into_iter()
        .map(|group| {
            let chain = &invoice.invoice_items[group.chain_index];
            let sub_lines: Vec<LineView> = group
                .sub_entity_lines()
                .iter()
                .map(|node| LineView::new(node, &currency))
                .collect();

            let mut main = LineView::new(group.main_entity, &currency);
            // Without visible sub lines the main row carries the whole chain.
            if sub_lines.is_empty() {
                main.amount = money(&currency, chain_total(chain));
            }

            let mut expenses: Vec<ExpenseView> = group
                .main_entity
                .expenses
                .iter()
                .map(|e| ExpenseView {
                    label: match e.description.as_deref() {
                        Some(d) => format!("{} ({})", e.kind, d),
                        None => e.kind.to_string(),
                    },
                    amount: money(&currency, e.amount()),
                })
                .collect();
            if expenses.len() > 1 {
                expenses.push(ExpenseView {
                    label: "Total expenses".to_string(),
                    amount: money(&currency, entity_expense_total(chain)),
                });
            }

            GroupView {
                index: group.index,
                main,
                country: group.main_entity.country_or_na().to_string(),
                sub_lines,
                expenses,
            }
        })
        .collect();

    RenderContext {
        invoice_number: invoice.display_number(),
        invoice_id: invoice.invoice_id.clone(),
        invoice_type: invoice.invoice_type.as_str(),
        invoice_date: invoice.invoice_date.clone().unwrap_or_default(),
        due_date: invoice.due_date.clone().unwrap_or_default(),
        status: invoice.status.as_str(),
        billed_to: invoice.billed_to(),
        company: PartyView::new(invoice.company.as_ref()),
        client: PartyView::new(invoice.client.as_ref()),
        groups,
        totals: TotalsView {
            subtotal: money(&currency, totals.subtotal),
            tax_rate: format!("{}", totals.tax_rate),
            tax: money(&currency, totals.tax),
            expenses: money(&currency, totals.expenses),
            has_expenses: totals.expenses > 0.0,
            total: money(&currency, totals.total_with_expenses),
        },
    }
}

pub struct TypstRenderer {
    tera: Tera,
    tax_rate: f64,
}

impl TypstRenderer {
    /// Renderer using the built-in template.
    pub fn builtin(tax_rate: f64) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
        tera.register_filter("typst_str", typst_str);
        Ok(Self { tera, tax_rate })
    }

    /// Renderer using `<data_root>/templates/invoice.tera`, written from the
    /// built-in template on first use so it can be customized.
    pub fn load(data_root: &Path, tax_rate: f64) -> Result<Self> {
        let template_dir = data_root.join("templates");
        fs::create_dir_all(&template_dir)?;
        let template_path = template_dir.join(TEMPLATE_NAME);
        if !template_path.exists() {
            info!(path = %template_path.display(), "initializing default invoice template");
            fs::write(&template_path, DEFAULT_TEMPLATE)?;
        }

        let mut tera = Tera::default();
        tera.add_template_file(&template_path, Some(TEMPLATE_NAME))?;
        tera.register_filter("typst_str", typst_str);
        Ok(Self { tera, tax_rate })
    }

    pub fn render_source(&self, invoice: &InvoiceDocument) -> Result<String> {
        let context = Context::from_serialize(build_context(invoice, self.tax_rate))?;
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }

    /// Writes `<stem>.typ` into `out_dir` and compiles it to `<stem>.pdf`.
    pub fn render_to_file(&self, invoice: &InvoiceDocument, out_dir: &Path, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)?;
        let typ_path = out_dir.join(format!("{}.typ", stem));
        let pdf_path = out_dir.join(format!("{}.pdf", stem));
        fs::write(&typ_path, self.render_source(invoice)?)?;

        debug!(path = %typ_path.display(), "compiling typst source");
        let status = Command::new("typst")
            .arg("compile")
            .arg(&typ_path)
            .arg(&pdf_path)
            .status()
            .map_err(|_| Error::PdfService("'typst' is not installed".to_string()))?;
        if !status.success() {
            return Err(Error::PdfService(format!("typst compilation failed for {}", typ_path.display())));
        }
        info!(path = %pdf_path.display(), "rendered invoice pdf");
        Ok(pdf_path)
    }

    pub fn render_pdf(&self, invoice: &InvoiceDocument, out_dir: &Path, stem: &str) -> Result<Vec<u8>> {
        let path = self.render_to_file(invoice, out_dir, stem)?;
        Ok(fs::read(path)?)
    }
}

pub fn typst_available() -> bool {
    Command::new("typst").arg("--version").output().is_ok()
}
