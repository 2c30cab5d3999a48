//! Local mirror of saved invoices, kept in `invoicesList.json` under the data
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::InvoiceDocument;

pub const STORE_FILE: &str = "invoicesList.json";

/// The `invoice_id` of a raw record, if it has a usable one.
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("invoice_id")? {
        Value::String(s) if !s.trim().is_empty() && s != "undefined" => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Keeps records with a usable id that parse as invoices; the rest are dropped.
pub fn usable_records(records: Vec<Value>) -> Vec<InvoiceDocument> {
    records.into_iter().filter_map(|record| read_record(&record)).collect()
}

fn read_record(record: &Value) -> Option<InvoiceDocument> {
    let id = record_id(record)?;
    let mut record = record.clone();
    record["invoice_id"] = Value::String(id.clone());
    match serde_json::from_value::<InvoiceDocument>(record) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(invoice_id = %id, "skipping unreadable invoice: {}", e);
            None
        }
    }
}

/// The invoice list file. Reads go through [`InvoiceDocument`], but writes
/// operate on the raw records so that entries this version cannot read are
/// written back exactly as found.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join(STORE_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<InvoiceDocument>> {
        let records = self.load_records()?;
        let total = records.len();
        let invoices = usable_records(records);
        if invoices.len() != total {
            debug!(dropped = total - invoices.len(), "filtered stored invoices");
        }
        Ok(invoices)
    }

    fn load_records(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Replaces the file contents. Written to a sibling temp file first so a
    /// crash never leaves a truncated list behind.
    fn write_records(&self, records: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn find(&self, invoice_id: &str) -> Result<Option<InvoiceDocument>> {
        Ok(self.load()?.into_iter().find(|i| i.invoice_id == invoice_id))
    }

    /// Replaces the record with the same id, or appends. Other records are
    /// left untouched.
    pub fn upsert(&self, invoice: &InvoiceDocument) -> Result<()> {
        let mut records = self.load_records()?;
        let record = serde_json::to_value(invoice)?;
        match records
            .iter_mut()
            .find(|r| record_id(r).as_deref() == Some(invoice.invoice_id.as_str()))
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.write_records(&records)?;
        info!(invoice_id = %invoice.invoice_id, "stored invoice locally");
        Ok(())
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, invoice_id: &str) -> Result<bool> {
        let mut records = self.load_records()?;
        let before = records.len();
        records.retain(|r| record_id(r).as_deref() != Some(invoice_id));
        if records.len() == before {
            return Ok(false);
        }
        self.write_records(&records)?;
        Ok(true)
    }
}

/// Local entries first, then backend entries whose id is not known locally.
pub fn merge_remote(local: Vec<InvoiceDocument>, remote: Vec<Value>) -> Vec<InvoiceDocument> {
    let mut merged = local;
    for doc in usable_records(remote) {
        if !merged.iter().any(|i| i.invoice_id == doc.invoice_id) {
            merged.push(doc);
        }
    }
    merged
}
