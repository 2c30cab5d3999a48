//! Bundling rendered invoices into one zip.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dates::format_date_for_api;
use crate::error::Result;
use crate::model::InvoiceDocument;
use crate::split::entity_slug;

/// `Invoice-<entity>-<invoice date>.pdf`
pub fn entry_name(invoice: &InvoiceDocument, today: NaiveDate) -> String {
    let entity = invoice.entity_name.clone().unwrap_or_else(|| invoice.billed_to());
    format!(
        "Invoice-{}-{}.pdf",
        entity_slug(&entity),
        format_date_for_api(invoice.invoice_date.as_deref(), today)
    )
}

pub fn archive_file_name(today: NaiveDate) -> String {
    format!("Invoices-{}.zip", today.format("%Y-%m-%d"))
}

/// Suffixes repeated names with `-2`, `-3`... before the extension.
fn dedupe(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));
    let mut n = 2;
    loop {
        let candidate = if ext.is_empty() { format!("{}-{}", stem, n) } else { format!("{}-{}.{}", stem, n, ext) };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Renders every invoice and writes them into `<out_dir>/Invoices-<today>.zip`.
pub fn export_invoices<F>(invoices: &[InvoiceDocument], out_dir: &Path, mut render: F) -> Result<PathBuf>
where
    F: FnMut(&InvoiceDocument) -> Result<Vec<u8>>,
{
    let today = Local::now().date_naive();
    let mut taken = HashSet::new();
    let mut entries = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let name = dedupe(entry_name(invoice, today), &mut taken);
        entries.push((name, render(invoice)?));
    }

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(archive_file_name(today));
    write_zip(&path, &entries)?;
    info!(path = %path.display(), count = entries.len(), "exported invoice archive");
    Ok(path)
}

pub fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;
    use tempfile::tempdir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
    }

    fn individual(entity: &str) -> InvoiceDocument {
        serde_json::from_value(json!({
            "invoice_id": format!("INV-{}", entity),
            "invoice_type": "individual",
            "entity_name": entity,
            "invoice_date": "07, Dec 2025"
        }))
        .unwrap()
    }

    #[test]
    fn names_follow_entity_and_date() {
        assert_eq!(entry_name(&individual("Acme Corp, India"), today()), "Invoice-acme-corp-07-12-2025.pdf");
        assert_eq!(archive_file_name(today()), "Invoices-2026-02-03.zip");
    }

    #[test]
    fn duplicate_names_get_suffixes() {
        let mut taken = HashSet::new();
        assert_eq!(dedupe("a.pdf".into(), &mut taken), "a.pdf");
        assert_eq!(dedupe("a.pdf".into(), &mut taken), "a-2.pdf");
        assert_eq!(dedupe("a.pdf".into(), &mut taken), "a-3.pdf");
    }

    #[test]
    fn export_writes_one_entry_per_invoice() {
        let dir = tempdir().unwrap();
        let invoices = vec![individual("Acme, India"), individual("Acme, UK"), individual("Beta, US")];
        let path = export_invoices(&invoices, dir.path(), |inv| Ok(inv.invoice_id.as_bytes().to_vec())).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "Invoice-acme-07-12-2025-2.pdf",
                "Invoice-acme-07-12-2025.pdf",
                "Invoice-beta-07-12-2025.pdf"
            ]
        );

        let mut content = String::new();
        archive.by_name("Invoice-beta-07-12-2025.pdf").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "INV-Beta, US");
    }

    #[test]
    fn render_failure_aborts_export() {
        let dir = tempdir().unwrap();
        let result = export_invoices(&[individual("A")], dir.path(), |_| Err(crate::Error::NoValidItems));
        assert!(result.is_err());
    }
}
