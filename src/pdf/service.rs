use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Value, json};

use super::document::PdfDocument;

/// Failure reported by a PDF service. Rate limiting is retried by the queue,
/// anything else is not.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    RateLimited,
    Failed(String),
}

pub trait PdfService: Send + 'static {
    fn render(&self, document: &PdfDocument) -> Result<Vec<u8>, ServiceError>;
}

/// Posts `{"data": <document>}` and expects the PDF back as base64, either
/// under `data.pdf` or `pdf`.
pub struct HttpPdfService {
    url: String,
    http: Client,
}

impl HttpPdfService {
    pub fn new(url: &str) -> crate::error::Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { url: url.to_string(), http })
    }
}

impl PdfService for HttpPdfService {
    fn render(&self, document: &PdfDocument) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "data": document }))
            .send()
            .map_err(|e| ServiceError::Failed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited);
        }
        if !status.is_success() {
            return Err(ServiceError::Failed(format!("status {}", status.as_u16())));
        }

        let body: Value = response.json().map_err(|e| ServiceError::Failed(e.to_string()))?;
        decode_pdf(&body)
    }
}

pub fn decode_pdf(body: &Value) -> Result<Vec<u8>, ServiceError> {
    let encoded = body
        .pointer("/data/pdf")
        .or_else(|| body.get("pdf"))
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::Failed("response carried no pdf".to_string()))?;
    STANDARD
        .decode(encoded)
        .map_err(|e| ServiceError::Failed(format!("invalid pdf encoding: {}", e)))
}
