//! Blocking client for the invoicing backend.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::model::{PrintView, SaveInvoicePayload, SaveResponse, Template, TemplateDraft};

/// What the invoice workflow needs from the backend.
pub trait Backend {
    fn templates(&self) -> Result<Vec<Template>>;
    fn print_view(&self, template_id: &str) -> Result<PrintView>;
    fn invoices(&self) -> Result<Vec<Value>>;
    fn create_invoice(&self, payload: &SaveInvoicePayload) -> Result<SaveResponse>;
}

pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder, fallback: &str) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: Value = response.json().unwrap_or(Value::Null);
        let message = error_message(&body, &format!("{} ({})", fallback, status.as_u16()));
        error!(status = status.as_u16(), "{}", message);
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(message));
        }
        Err(Error::Backend { status: status.as_u16(), message })
    }

    fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> Result<T> {
        Ok(self.send(request, fallback)?.json()?)
    }

    pub fn create_template(&self, draft: &TemplateDraft) -> Result<Value> {
        let request = self.http.post(self.url("/api/template")).json(draft);
        self.get_json(request, "Failed to create Template")
    }

    pub fn update_template(&self, template_id: &str, draft: &TemplateDraft) -> Result<Value> {
        let request = self
            .http
            .patch(self.url("/api/template"))
            .query(&[("template_id", template_id)])
            .json(draft);
        self.get_json(request, "Failed to update Template")
    }

    pub fn delete_template(&self, template_id: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.url("/api/template"))
            .query(&[("template_id", template_id)]);
        self.send(request, "Failed to delete Template")?;
        Ok(())
    }

    /// Mermaid source describing the template's entity tree.
    pub fn template_tree(&self, template_id: &str) -> Result<String> {
        let request = self
            .http
            .get(self.url("/api/template/tree-view"))
            .query(&[("template_id", template_id)]);
        let body: Value = self.get_json(request, "Failed to fetch mermaid diagram")?;
        Ok(diagram_script(&body))
    }
}

impl Backend for ApiClient {
    fn templates(&self) -> Result<Vec<Template>> {
        self.get_json(self.http.get(self.url("/api/templates")), "Failed to fetch templates")
    }

    fn print_view(&self, template_id: &str) -> Result<PrintView> {
        debug!(template_id, "fetching print view");
        let request = self
            .http
            .get(self.url("/api/invoice/print-view"))
            .query(&[("template_id", template_id), ("hirearchy", "True")]);
        self.get_json(request, "Failed to fetch invoice data")
    }

    fn invoices(&self) -> Result<Vec<Value>> {
        let body: Value = self.get_json(self.http.get(self.url("/api/invoices")), "Failed to fetch invoices")?;
        Ok(invoice_list(body))
    }

    fn create_invoice(&self, payload: &SaveInvoicePayload) -> Result<SaveResponse> {
        let request = self.http.post(self.url("/api/invoice")).json(payload);
        self.get_json(request, "Failed to save invoice")
    }
}

/// Message for a failed response: `detail`, then `message`, then `fallback`.
pub fn error_message(body: &Value, fallback: &str) -> String {
    ["detail", "message"]
        .iter()
        .filter_map(|key| body.get(key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// The invoices endpoint answers with either a bare array or `{"data": [...]}`.
pub fn invoice_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// The tree view returns its script as an array of lines or a single string.
pub fn diagram_script(body: &Value) -> String {
    match body.get("script") {
        Some(Value::Array(lines)) => lines
            .iter()
            .map(|l| l.as_str().map(str::to_string).unwrap_or_else(|| l.to_string()))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_detail_then_message() {
        assert_eq!(error_message(&json!({"detail": "bad id", "message": "x"}), "fb"), "bad id");
        assert_eq!(error_message(&json!({"message": "nope"}), "fb"), "nope");
        assert_eq!(error_message(&json!({}), "Failed to save invoice (500)"), "Failed to save invoice (500)");
        assert_eq!(error_message(&Value::Null, "fb"), "fb");
        assert_eq!(error_message(&json!({"detail": [{"loc": "x"}]}), "fb"), r#"[{"loc":"x"}]"#);
    }

    #[test]
    fn invoice_list_accepts_both_shapes() {
        assert_eq!(invoice_list(json!([{"a": 1}])).len(), 1);
        assert_eq!(invoice_list(json!({"data": [{"a": 1}, {"b": 2}]})).len(), 2);
        assert!(invoice_list(json!({"oops": true})).is_empty());
    }

    #[test]
    fn diagram_lines_are_joined() {
        let body = json!({"script": ["graph TD", "A-->B"]});
        assert_eq!(diagram_script(&body), "graph TD\nA-->B");
        assert_eq!(diagram_script(&json!({"script": "graph LR"})), "graph LR");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.url("/api/templates"), "http://localhost:8000/api/templates");
    }
}
