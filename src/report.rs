//! Terminal tables.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use comfy_table::{Attribute, Cell, Color, Table};

use crate::dates::parse_any_date;
use crate::entities::{Entity, ProjectRecord};
use crate::flatten::group_for_display;
use crate::model::{InvoiceDocument, InvoiceStatus, Template};
use crate::split::MainEntity;
use crate::totals::{InvoiceTotals, chain_total, line_duration, line_total, resolved_rate};

const RED: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };

fn money(amount: f64) -> String {
    format!("${:.2}", amount)
}

fn status_cell(status: InvoiceStatus) -> Cell {
    let cell = Cell::new(status.as_str().to_uppercase());
    match status {
        InvoiceStatus::Paid => cell.fg(GREEN),
        InvoiceStatus::Overdue => cell.fg(RED),
        InvoiceStatus::Void => cell.add_attribute(Attribute::CrossedOut),
        _ => cell,
    }
}

pub fn invoice_list_table(invoices: &[InvoiceDocument]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["No.", "Invoice ID", "Type", "Billed To", "Date", "Due", "Status", "Total"]);
    for invoice in invoices {
        table.add_row(vec![
            Cell::new(invoice.display_number()),
            Cell::new(&invoice.invoice_id),
            Cell::new(invoice.invoice_type.as_str()),
            Cell::new(invoice.billed_to()),
            Cell::new(invoice.invoice_date.as_deref().unwrap_or("-")),
            Cell::new(invoice.due_date.as_deref().unwrap_or("-")),
            status_cell(invoice.status),
            Cell::new(money(invoice.total_amount)),
        ]);
    }
    table
}

/// Line items grouped per chain, then the totals. The headline total leaves
/// expenses out; the figure including them is listed separately.
pub fn preview_table(invoice: &InvoiceDocument, totals: &InvoiceTotals) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Entity", "Type", "Duration", "Rate", "Amount"]);

    for group in group_for_display(&invoice.invoice_items, invoice.invoice_type, invoice.show_project_hierarchy) {
        let main = group.main_entity;
        let lines = group.sub_entity_lines();
        let amount = if lines.is_empty() {
            chain_total(&invoice.invoice_items[group.chain_index])
        } else {
            line_total(main)
        };
        table.add_row(vec![
            Cell::new(group.index),
            Cell::new(main.entity_label()).add_attribute(Attribute::Bold),
            Cell::new(main.category()),
            Cell::new(line_duration(main)),
            Cell::new(money(resolved_rate(main))),
            Cell::new(money(amount)),
        ]);
        for node in lines {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(format!("  ↳ {}", node.display_name())),
                Cell::new(node.category()),
                Cell::new(line_duration(node)),
                Cell::new(money(resolved_rate(node))),
                Cell::new(money(line_total(node))),
            ]);
        }
        for expense in &main.expenses {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(format!("  Expense: {}", expense.kind)),
                Cell::new(expense.description.as_deref().unwrap_or("")),
                Cell::new(""),
                Cell::new(""),
                Cell::new(money(expense.amount())),
            ]);
        }
    }

    let label = |s: &str| Cell::new(s).add_attribute(Attribute::Bold);
    let blank = || vec![Cell::new(""), Cell::new(""), Cell::new(""), Cell::new("")];
    let mut row = |name: Cell, value: Cell| {
        let mut cells = blank();
        cells.push(name);
        cells.push(value);
        table.add_row(cells);
    };
    row(label("Subtotal"), Cell::new(money(totals.subtotal)));
    row(label(&format!("Tax ({}%)", totals.tax_rate)), Cell::new(money(totals.tax)));
    row(
        label("Total"),
        Cell::new(money(totals.total_without_expenses)).add_attribute(Attribute::Bold),
    );
    if totals.expenses > 0.0 {
        row(label("Expenses"), Cell::new(money(totals.expenses)));
        row(label("Total incl. expenses"), Cell::new(money(totals.total_with_expenses)));
    }
    table
}

pub fn entities_table(entities: &[MainEntity]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Index", "Entity", "Country"]);
    for entity in entities {
        table.add_row(vec![Cell::new(entity.index), Cell::new(&entity.name), Cell::new(&entity.country)]);
    }
    table
}

pub fn templates_table(templates: &[Template]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Description"]);
    for template in templates {
        table.add_row(vec![
            Cell::new(template.id_string()),
            Cell::new(&template.name),
            Cell::new(template.description.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn registry_table(entities: &[Entity]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Country", "Email", "Mobile"]);
    for entity in entities {
        let kind = match &entity.type3 {
            Some(t3) => format!("{} / {}", entity.type2, t3),
            None => entity.type2.clone(),
        };
        table.add_row(vec![
            Cell::new(entity.id),
            Cell::new(&entity.name),
            Cell::new(kind),
            Cell::new(entity.country.as_deref().unwrap_or("")),
            Cell::new(entity.email.as_deref().unwrap_or("")),
            Cell::new(entity.mobile.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn projects_table(projects: &[ProjectRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Given By", "Taken By", "Rate", "Period"]);
    for project in projects {
        let rate = match (&project.rate_mode, project.rate_amount) {
            (Some(mode), Some(amount)) => format!("{} {:.2} ({})", project.currency, amount, mode.as_str()),
            (None, Some(amount)) => format!("{} {:.2}", project.currency, amount),
            _ => "-".to_string(),
        };
        let period = format!(
            "{} → {}",
            project.start_date.as_deref().unwrap_or("?"),
            project.end_date.as_deref().unwrap_or("?")
        );
        table.add_row(vec![
            Cell::new(project.id),
            Cell::new(&project.name),
            Cell::new(project.given_by.as_deref().unwrap_or("")),
            Cell::new(project.taken_by.as_deref().unwrap_or("")),
            Cell::new(rate),
            Cell::new(period),
        ]);
    }
    table
}

// ==========================================
// Summary
// ==========================================

/// Paid and outstanding amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Split {
    pub paid: f64,
    pub unpaid: f64,
}

impl Split {
    fn add(&mut self, status: InvoiceStatus, amount: f64) {
        if status == InvoiceStatus::Paid {
            self.paid += amount;
        } else {
            self.unpaid += amount;
        }
    }

    pub fn total(&self) -> f64 {
        self.paid + self.unpaid
    }
}

#[derive(Debug, Default)]
pub struct Summary {
    pub months: BTreeMap<(i32, u32), Split>,
    pub clients: BTreeMap<String, Split>,
}

/// Per-month and per-client totals for `year`. Void invoices and invoices
/// without a readable date are left out.
pub fn summarize(invoices: &[InvoiceDocument], year: i32) -> Summary {
    let mut summary = Summary::default();
    for invoice in invoices {
        if invoice.status == InvoiceStatus::Void {
            continue;
        }
        let Some(date) = invoice.invoice_date.as_deref().and_then(parse_any_date) else {
            continue;
        };
        if date.year() != year {
            continue;
        }
        summary
            .months
            .entry((date.year(), date.month()))
            .or_default()
            .add(invoice.status, invoice.total_amount);
        summary
            .clients
            .entry(invoice.billed_to())
            .or_default()
            .add(invoice.status, invoice.total_amount);
    }
    summary
}

fn split_cells(split: &Split) -> [Cell; 3] {
    let paid = Cell::new(money(split.paid));
    let unpaid = Cell::new(money(split.unpaid));
    [
        if split.paid > 0.0 { paid.fg(GREEN) } else { paid },
        if split.unpaid > 0.0 { unpaid.fg(RED) } else { unpaid },
        Cell::new(money(split.total())),
    ]
}

pub fn monthly_table(summary: &Summary, year: i32) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Month", "Paid", "Unpaid", "Total"]);

    let mut grand = Split::default();
    for ((y, m), split) in summary.months.iter().rev() {
        let month = NaiveDate::from_ymd_opt(*y, *m, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", y, m));
        let [paid, unpaid, total] = split_cells(split);
        table.add_row(vec![Cell::new(month), paid, unpaid, total]);
        grand.paid += split.paid;
        grand.unpaid += split.unpaid;
    }

    let [paid, unpaid, total] = split_cells(&grand);
    table.add_row(vec![
        Cell::new(format!("Total ({})", year)).add_attribute(Attribute::Bold),
        paid.add_attribute(Attribute::Bold),
        unpaid.add_attribute(Attribute::Bold),
        total.add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn client_table(summary: &Summary) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Client", "Paid", "Unpaid", "Total"]);

    let mut clients: Vec<_> = summary.clients.iter().collect();
    clients.sort_by(|a, b| b.1.total().total_cmp(&a.1.total()));
    for (client, split) in clients {
        let [paid, unpaid, total] = split_cells(split);
        table.add_row(vec![Cell::new(client), paid, unpaid, total]);
    }
    table
}
