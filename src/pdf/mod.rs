//! PDF output: the external-service document behind a throttled queue and a
//! cache, plus a local Typst renderer.

pub mod cache;
pub mod document;
pub mod queue;
pub mod render;
pub mod service;

use tracing::{debug, info};

use crate::error::Result;
use crate::model::InvoiceDocument;

pub use cache::PdfCache;
pub use document::{PdfDocument, build_document};
pub use queue::{PdfQueue, QueueConfig};
pub use render::TypstRenderer;
pub use service::{HttpPdfService, PdfService, ServiceError};

pub struct PdfGenerator {
    queue: PdfQueue,
    cache: PdfCache,
    tax_rate: f64,
}

impl PdfGenerator {
    pub fn new<S: PdfService>(service: S, config: QueueConfig, cache_max_entries: Option<usize>, tax_rate: f64) -> Self {
        Self {
            queue: PdfQueue::start(service, config),
            cache: PdfCache::new(cache_max_entries),
            tax_rate,
        }
    }

    /// PDF bytes for the invoice, from cache when this invoice number was
    /// already rendered.
    pub fn generate(&mut self, invoice: &InvoiceDocument) -> Result<Vec<u8>> {
        let document = build_document(invoice, self.tax_rate, false)?;
        let key = document.invoice_number.clone();
        if let Some(pdf) = self.cache.get(&key) {
            debug!(invoice_number = %key, "using cached pdf");
            return Ok(pdf.to_vec());
        }

        let pdf = self.queue.submit(document)?;
        info!(invoice_number = %key, bytes = pdf.len(), "generated pdf");
        self.cache.insert(key, pdf.clone());
        Ok(pdf)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}
