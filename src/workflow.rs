//! The invoice lifecycle: generate from a template, edit, save to the backend
//! and mirror locally, delete.

use chrono::Local;
use tracing::{info, warn};

use crate::api::Backend;
use crate::dates::format_date_for_api;
use crate::error::{Error, Result};
use crate::model::{GeneratedInvoices, InvoiceDocument, InvoiceType, SaveInvoicePayload, Template, id_to_string};
use crate::session::EditSession;
use crate::split::{EntitySelection, MainEntity, build_bulk, main_entities, split_individual};
use crate::store::{LocalStore, merge_remote};
use crate::totals::InvoiceTotals;

pub struct InvoiceWorkflow<B: Backend> {
    backend: B,
    store: LocalStore,
    tax_rate: f64,
    session: Option<EditSession>,
}

impl<B: Backend> InvoiceWorkflow<B> {
    pub fn new(backend: B, store: LocalStore, tax_rate: f64) -> Self {
        Self { backend, store, tax_rate, session: None }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    pub fn templates(&self) -> Result<Vec<Template>> {
        self.backend.templates()
    }

    /// Local invoices plus any the backend knows that are not stored locally.
    /// An unreachable backend degrades to the local list.
    pub fn list_invoices(&self) -> Result<Vec<InvoiceDocument>> {
        let local = self.store.load()?;
        match self.backend.invoices() {
            Ok(remote) => Ok(merge_remote(local, remote)),
            Err(e) => {
                warn!("backend invoice list unavailable, showing local invoices: {}", e);
                Ok(local)
            }
        }
    }

    pub fn find_invoice(&self, invoice_id: &str) -> Result<InvoiceDocument> {
        self.list_invoices()?
            .into_iter()
            .find(|i| i.invoice_id == invoice_id)
            .ok_or_else(|| Error::not_found(format!("Invoice {}", invoice_id)))
    }

    pub fn totals(&self, invoice: &InvoiceDocument) -> InvoiceTotals {
        InvoiceTotals::compute(&invoice.invoice_items, invoice.invoice_type, self.tax_rate)
    }

    pub fn generate_bulk(&self, template_id: &str, show_hierarchy: bool) -> Result<InvoiceDocument> {
        let view = self.backend.print_view(template_id)?;
        let invoice = build_bulk(&view, show_hierarchy);
        info!(invoice_id = %invoice.invoice_id, chains = invoice.invoice_items.len(), "generated bulk invoice");
        Ok(invoice)
    }

    pub fn main_entities(&self, template_id: &str) -> Result<Vec<MainEntity>> {
        Ok(main_entities(&self.backend.print_view(template_id)?))
    }

    /// `selection` is `"all"` or a chain index; empty means nothing was picked.
    pub fn generate_individual(
        &self,
        template_id: &str,
        selection: &str,
        show_hierarchy: bool,
    ) -> Result<GeneratedInvoices> {
        let selection = EntitySelection::parse(selection)?;
        let view = self.backend.print_view(template_id)?;
        let invoices = split_individual(&view, selection, show_hierarchy)?;
        Ok(GeneratedInvoices { invoices, show_project_hierarchy: show_hierarchy })
    }

    /// Posts the invoice and, only once the backend accepts it, mirrors the
    /// full document into the local store.
    pub fn save(&self, invoice: &InvoiceDocument) -> Result<InvoiceDocument> {
        let totals = self.totals(invoice);
        let today = Local::now().date_naive();
        let payload = SaveInvoicePayload {
            template_id: invoice.template_id.clone(),
            invoice_date: format_date_for_api(invoice.invoice_date.as_deref(), today),
            due_date: format_date_for_api(invoice.due_date.as_deref(), today),
            show_project_hirearchy: invoice.show_project_hierarchy,
            total_amount: totals.total_with_expenses,
            status: invoice.status,
        };

        let response = self.backend.create_invoice(&payload)?;

        let mut stored = invoice.clone();
        stored.total_amount = totals.total_with_expenses;
        stored.client_name = match invoice.invoice_type {
            InvoiceType::Individual => invoice.entity_name.clone(),
            InvoiceType::Bulk => invoice.client.as_ref().and_then(|c| c.name.clone()),
        };
        stored.message = response.message;
        self.store.upsert(&stored)?;

        info!(
            invoice_id = %stored.invoice_id,
            template_id = %invoice.template_id.as_ref().map(id_to_string).unwrap_or_default(),
            total = stored.total_amount,
            "saved invoice"
        );
        Ok(stored)
    }

    /// Saves one after another and stops at the first failure. Invoices saved
    /// before the failure stay saved.
    pub fn save_all(&self, invoices: &[InvoiceDocument]) -> Result<Vec<InvoiceDocument>> {
        let mut saved = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            match self.save(invoice) {
                Ok(doc) => saved.push(doc),
                Err(e) => {
                    return Err(Error::BatchAborted {
                        saved: saved.len(),
                        total: invoices.len(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(saved)
    }

    /// Opens an edit session on a stored invoice. Missing client or company
    /// snapshots are filled from the template's print view when possible.
    pub fn begin_edit(&mut self, invoice_id: &str) -> Result<&mut EditSession> {
        let mut invoice = self
            .store
            .find(invoice_id)?
            .ok_or_else(|| Error::not_found(format!("Invoice {}", invoice_id)))?;

        if invoice.client.is_none() || invoice.company.is_none() {
            if let Some(template_id) = invoice.template_id.as_ref().map(id_to_string) {
                match self.backend.print_view(&template_id) {
                    Ok(view) => {
                        invoice.client = invoice.client.or(view.client);
                        invoice.company = invoice.company.or(view.company);
                    }
                    Err(e) => warn!(invoice_id, "could not fill parties from template: {}", e),
                }
            }
        }

        Ok(self.session.insert(EditSession::begin(invoice, self.tax_rate)))
    }

    pub fn session_mut(&mut self) -> Result<&mut EditSession> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::validation("No invoice is being edited"))
    }

    /// Saves the edited invoice through [`save`](Self::save) and ends the
    /// session. If the backend rejects it the session stays open.
    pub fn commit_edit(&mut self) -> Result<InvoiceDocument> {
        let draft = self
            .session
            .as_ref()
            .ok_or_else(|| Error::validation("No invoice is being edited"))?
            .invoice()
            .clone();
        let saved = self.save(&draft)?;
        self.session = None;
        Ok(saved)
    }

    pub fn cancel_edit(&mut self) -> Option<InvoiceDocument> {
        self.session.take().map(EditSession::cancel)
    }

    pub fn delete(&self, invoice_id: &str) -> Result<()> {
        if invoice_id.trim().is_empty() {
            return Err(Error::validation("Invoice id is required"));
        }
        if !self.store.remove(invoice_id)? {
            return Err(Error::not_found(format!("Invoice {}", invoice_id)));
        }
        info!(invoice_id, "deleted invoice");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrintView, SaveResponse};
    use serde_json::{Value, json};
    use std::cell::{Cell, RefCell};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct FakeBackend {
        view: Value,
        remote: Option<Vec<Value>>,
        fail_on_call: Option<usize>,
        calls: Cell<usize>,
        posted: RefCell<Vec<SaveInvoicePayload>>,
    }

    impl Backend for FakeBackend {
        fn templates(&self) -> Result<Vec<Template>> {
            Ok(vec![serde_json::from_value(json!({"id": 3, "name": "Monthly"}))?])
        }

        fn print_view(&self, _template_id: &str) -> Result<PrintView> {
            Ok(serde_json::from_value(self.view.clone())?)
        }

        fn invoices(&self) -> Result<Vec<Value>> {
            self.remote.clone().ok_or(Error::Backend { status: 503, message: "down".into() })
        }

        fn create_invoice(&self, payload: &SaveInvoicePayload) -> Result<SaveResponse> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if self.fail_on_call == Some(call) {
                return Err(Error::Backend { status: 500, message: "Failed to save invoice".into() });
            }
            self.posted.borrow_mut().push(payload.clone());
            Ok(SaveResponse { message: Some("Invoice saved".into()), ..Default::default() })
        }
    }

    fn view() -> Value {
        json!({
            "template_id": 3,
            "client": {"id": 1, "name": "Client Co"},
            "company": {"id": 2, "name": "Our Co"},
            "invoice_date": "07, Dec 2025",
            "due_date": "06, Jan 2026",
            "invoice_items": [
                [{"name": "Acme", "country": "India", "rate_amount": 100, "duration": 2,
                  "expenses": [{"type": "Food", "amount": 20}]}],
                [{"name": "Beta", "country": "UK", "rate_amount": 10}]
            ]
        })
    }

    fn workflow(backend: FakeBackend) -> (InvoiceWorkflow<FakeBackend>, TempDir) {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        (InvoiceWorkflow::new(backend, store, 10.0), dir)
    }

    #[test]
    fn save_posts_normalized_payload_and_mirrors_locally() {
        let (wf, _dir) = workflow(FakeBackend { view: view(), ..Default::default() });
        let generated = wf.generate_individual("3", "0", true).unwrap();
        let saved = wf.save(&generated.invoices[0]).unwrap();

        let posted = wf.backend().posted.borrow();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].invoice_date, "07-12-2025");
        assert_eq!(posted[0].due_date, "06-01-2026");
        // 200 + 20 tax + 20 expenses
        assert_eq!(posted[0].total_amount, 240.0);

        assert_eq!(saved.client_name.as_deref(), Some("Acme, India"));
        assert_eq!(saved.message.as_deref(), Some("Invoice saved"));
        assert_eq!(wf.store.load().unwrap().len(), 1);
    }

    #[test]
    fn bulk_client_name_comes_from_client() {
        let (wf, _dir) = workflow(FakeBackend { view: view(), ..Default::default() });
        let bulk = wf.generate_bulk("3", false).unwrap();
        let saved = wf.save(&bulk).unwrap();
        assert_eq!(saved.client_name.as_deref(), Some("Client Co"));
        assert!(!saved.show_project_hierarchy);
    }

    #[test]
    fn failed_save_leaves_local_list_untouched() {
        let (wf, _dir) = workflow(FakeBackend { view: view(), fail_on_call: Some(0), ..Default::default() });
        let bulk = wf.generate_bulk("3", true).unwrap();
        let err = wf.save(&bulk).unwrap_err();
        assert_eq!(err.to_string(), "Failed to save invoice");
        assert!(wf.store.load().unwrap().is_empty());
    }

    #[test]
    fn save_all_stops_at_first_failure() {
        let (wf, _dir) = workflow(FakeBackend { view: view(), fail_on_call: Some(1), ..Default::default() });
        let generated = wf.generate_individual("3", "all", true).unwrap();
        assert_eq!(generated.invoices.len(), 2);

        let err = wf.save_all(&generated.invoices).unwrap_err();
        assert!(matches!(err, Error::BatchAborted { saved: 1, total: 2, .. }));
        assert_eq!(wf.store.load().unwrap().len(), 1);
    }

    #[test]
    fn empty_selection_is_rejected_before_fetching() {
        let (wf, _dir) = workflow(FakeBackend { view: json!("not a view"), ..Default::default() });
        assert!(matches!(wf.generate_individual("3", "", true), Err(Error::NoEntitySelected)));
    }

    #[test]
    fn listing_falls_back_to_local_when_backend_is_down() {
        let (wf, _dir) = workflow(FakeBackend { view: view(), ..Default::default() });
        wf.save(&wf.generate_bulk("3", true).unwrap()).unwrap();
        assert_eq!(wf.list_invoices().unwrap().len(), 1);
    }

    #[test]
    fn listing_merges_remote_invoices() {
        let backend = FakeBackend {
            view: view(),
            remote: Some(vec![json!({"invoice_id": "REMOTE-1"}), json!({"invoice_id": "undefined"})]),
            ..Default::default()
        };
        let (wf, _dir) = workflow(backend);
        wf.save(&wf.generate_bulk("3", true).unwrap()).unwrap();
        let all = wf.list_invoices().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].invoice_id, "REMOTE-1");
    }

    #[test]
    fn edit_commit_posts_recomputed_invoice_and_stores() {
        let (mut wf, _dir) = workflow(FakeBackend { view: view(), ..Default::default() });
        let saved = wf.save(&wf.generate_individual("3", "1", true).unwrap().invoices[0]).unwrap();
        assert_eq!(saved.total_amount, 11.0);

        let session = wf.begin_edit(&saved.invoice_id).unwrap();
        session.set_duration(0, 0, 5.0).unwrap();
        let committed = wf.commit_edit().unwrap();
        assert_eq!(committed.total_amount, 55.0);
        assert_eq!(committed.message.as_deref(), Some("Invoice saved"));

        let posted = wf.backend().posted.borrow();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[1].total_amount, 55.0);
        assert_eq!(posted[1].invoice_date, "07-12-2025");
        drop(posted);

        let stored = wf.store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].total_amount, 55.0);
        assert!(wf.session_mut().is_err());
    }

    #[test]
    fn rejected_edit_keeps_session_and_local_copy() {
        let (mut wf, _dir) = workflow(FakeBackend { view: view(), fail_on_call: Some(1), ..Default::default() });
        let saved = wf.save(&wf.generate_individual("3", "1", true).unwrap().invoices[0]).unwrap();

        wf.begin_edit(&saved.invoice_id).unwrap().set_duration(0, 0, 5.0).unwrap();
        assert!(wf.commit_edit().is_err());

        assert_eq!(wf.store.find(&saved.invoice_id).unwrap().unwrap().total_amount, 11.0);
        let session = wf.session_mut().unwrap();
        assert!(session.is_dirty());
        assert_eq!(session.totals().total_with_expenses, 55.0);
    }

    #[test]
    fn malformed_records_do_not_block_other_operations() {
        let backend = FakeBackend {
            view: view(),
            remote: Some(vec![
                json!({"invoice_id": "REMOTE-1", "invoice_items": [null, [{"name": "R", "rate_amount": "5"}]]}),
                json!({"invoice_id": "REMOTE-2", "status": ["broken"]}),
            ]),
            ..Default::default()
        };
        let (mut wf, dir) = workflow(backend);
        fs::write(
            wf.store.path(),
            json!([{"invoice_id": "OLD-1", "invoice_items": [[{"name": "Dev", "rate_amount": 50}], null, 42]}])
                .to_string(),
        )
        .unwrap();

        let old = wf.find_invoice("OLD-1").unwrap();
        assert_eq!(wf.totals(&old).subtotal, 50.0);

        let saved = wf.save(&wf.generate_bulk("3", true).unwrap()).unwrap();
        let ids: Vec<_> = wf.list_invoices().unwrap().into_iter().map(|i| i.invoice_id).collect();
        assert_eq!(ids, vec!["OLD-1".to_string(), saved.invoice_id.clone(), "REMOTE-1".to_string()]);

        wf.begin_edit("OLD-1").unwrap().set_duration(0, 0, 2.0).unwrap();
        assert_eq!(wf.commit_edit().unwrap().total_amount, 110.0);
        wf.delete(&saved.invoice_id).unwrap();
        assert_eq!(LocalStore::new(dir.path()).load().unwrap().len(), 1);
    }

    #[test]
    fn edit_fills_missing_parties_from_template() {
        let (mut wf, _dir) = workflow(FakeBackend { view: view(), ..Default::default() });
        let mut invoice = wf.generate_bulk("3", true).unwrap();
        invoice.company = None;
        wf.store.upsert(&invoice).unwrap();

        let session = wf.begin_edit(&invoice.invoice_id).unwrap();
        assert_eq!(session.invoice().company.as_ref().and_then(|c| c.name.as_deref()), Some("Our Co"));
        assert!(wf.cancel_edit().is_some());
        assert!(wf.store.find(&invoice.invoice_id).unwrap().unwrap().company.is_none());
    }

    #[test]
    fn delete_requires_known_id() {
        let (wf, _dir) = workflow(FakeBackend { view: view(), ..Default::default() });
        assert!(matches!(wf.delete(" "), Err(Error::Validation(_))));
        assert!(wf.delete("INV-404").unwrap_err().is_not_found());

        let saved = wf.save(&wf.generate_bulk("3", true).unwrap()).unwrap();
        wf.delete(&saved.invoice_id).unwrap();
        assert!(wf.store.load().unwrap().is_empty());
    }
}
