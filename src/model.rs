use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::chain;

// ==========================================
// Billing Data
// ==========================================

/// Billing cadence of a project. Parsed case-insensitively; unknown modes are
/// kept verbatim so they survive a save round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RateMode {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Milestone,
    Fixed,
    Other(String),
}

impl RateMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => RateMode::Hourly,
            "daily" => RateMode::Daily,
            "weekly" => RateMode::Weekly,
            "monthly" => RateMode::Monthly,
            "milestone" => RateMode::Milestone,
            "fixed" => RateMode::Fixed,
            _ => RateMode::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RateMode::Hourly => "Hourly",
            RateMode::Daily => "Daily",
            RateMode::Weekly => "Weekly",
            RateMode::Monthly => "Monthly",
            RateMode::Milestone => "Milestone",
            RateMode::Fixed => "Fixed",
            RateMode::Other(s) => s,
        }
    }
}

impl From<String> for RateMode {
    fn from(s: String) -> Self {
        RateMode::parse(&s)
    }
}

impl From<RateMode> for String {
    fn from(mode: RateMode) -> Self {
        mode.as_str().to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_mode: Option<RateMode>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub rate_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseType {
    Food,
    Travel,
    Lodging,
}

impl ExpenseType {
    pub const ALL: [ExpenseType; 3] = [ExpenseType::Food, ExpenseType::Travel, ExpenseType::Lodging];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseType::Food => "Food",
            ExpenseType::Travel => "Travel",
            ExpenseType::Lodging => "Lodging",
        }
    }
}

impl std::fmt::Display for ExpenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
    #[serde(rename = "type")]
    pub kind: ExpenseType,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Expense {
    pub fn amount(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }
}

/// One party in a billing chain (consultant, company, client, vendor...).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct EntityNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub rate_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_mode: Option<RateMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub expenses: Vec<Expense>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityNode {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn category(&self) -> &str {
        self.type1.as_deref().unwrap_or("N/A")
    }

    pub fn country_or_na(&self) -> &str {
        self.country.as_deref().unwrap_or("N/A")
    }

    /// `"<name>, <country>"`, the label individual invoices are addressed to.
    pub fn entity_label(&self) -> String {
        format!("{}, {}", self.display_name(), self.country_or_na())
    }

    pub fn currency(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.currency.as_deref())
    }
}

/// Ordered billing hierarchy. Index 0 is the directly billed (main) entity.
/// Never empty: construction goes through [`EntityChain::new`] or the
/// ingestion normalizer in [`crate::chain`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct EntityChain(Vec<EntityNode>);

impl EntityChain {
    pub fn new(nodes: Vec<EntityNode>) -> Option<Self> {
        if nodes.is_empty() { None } else { Some(Self(nodes)) }
    }

    pub fn single(node: EntityNode) -> Self {
        Self(vec![node])
    }

    pub fn main(&self) -> &EntityNode {
        &self.0[0]
    }

    pub fn main_mut(&mut self) -> &mut EntityNode {
        &mut self.0[0]
    }

    pub fn nodes(&self) -> &[EntityNode] {
        &self.0
    }

    pub fn nodes_mut(&mut self) -> &mut [EntityNode] {
        &mut self.0
    }

    /// Every node after the main entity.
    pub fn sub_entities(&self) -> &[EntityNode] {
        &self.0[1..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Serialize for EntityChain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

// ==========================================
// Parties & Templates
// ==========================================

/// Snapshot of a client or company as returned by the print-view endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Party {
    pub fn has_id(&self) -> bool {
        !matches!(self.id, None | Some(Value::Null))
    }

    pub fn postal(&self) -> &str {
        self.postal_code.as_deref().or(self.zip.as_deref()).unwrap_or("")
    }

    pub fn contact_phone(&self) -> &str {
        self.mobile.as_deref().or(self.phone.as_deref()).unwrap_or("")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Template {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Template {
    pub fn id_string(&self) -> String {
        id_to_string(&self.id)
    }
}

/// Body for creating or updating a template.
#[derive(Debug, Serialize, Clone, Default)]
pub struct TemplateDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregated chains for one template, as served by the print-view endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PrintView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Party>,
    #[serde(default, deserialize_with = "chain::deserialize_items")]
    pub invoice_items: Vec<EntityChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ==========================================
// Invoices
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    #[default]
    Bulk,
    Individual,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Bulk => "bulk",
            InvoiceType::Individual => "individual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    Paid,
    Void,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "issued" => InvoiceStatus::Issued,
            "paid" => InvoiceStatus::Paid,
            "void" => InvoiceStatus::Void,
            "overdue" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Draft,
        }
    }
}

impl From<String> for InvoiceStatus {
    fn from(s: String) -> Self {
        InvoiceStatus::from_string(&s)
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InvoiceDocument {
    pub invoice_id: String,
    #[serde(default)]
    pub invoice_type: InvoiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Value>,
    #[serde(default, deserialize_with = "chain::deserialize_items")]
    pub invoice_items: Vec<EntityChain>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(
        rename = "show_project_hirearchy",
        alias = "show_project_hierarchy",
        default = "default_true",
        deserialize_with = "null_as_true"
    )]
    pub show_project_hierarchy: bool,
    #[serde(default, deserialize_with = "lenient_total")]
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InvoiceDocument {
    /// Invoice number shown on cards: `INV-` plus the zero-padded template id.
    pub fn display_number(&self) -> String {
        let base = self.template_id.as_ref().map(id_to_string).unwrap_or_else(|| "1".to_string());
        format!("INV-{:0>3}", base)
    }

    /// Name of the billed party: the entity for individual invoices, the client otherwise.
    pub fn billed_to(&self) -> String {
        match self.invoice_type {
            InvoiceType::Individual => self
                .entity_name
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            InvoiceType::Bulk => self
                .client
                .as_ref()
                .and_then(|c| c.name.clone())
                .or_else(|| self.client_name.clone())
                .unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

/// Result of an "all entities" individual generation.
#[derive(Debug, Clone)]
pub struct GeneratedInvoices {
    pub invoices: Vec<InvoiceDocument>,
    pub show_project_hierarchy: bool,
}

/// Normalized body posted to `POST /api/invoice`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SaveInvoicePayload {
    pub template_id: Option<Value>,
    pub invoice_date: String,
    pub due_date: String,
    pub show_project_hirearchy: bool,
    pub total_amount: f64,
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SaveResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ==========================================
// Serde Helpers
// ==========================================

pub fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// Amounts arrive as numbers or numeric strings (`"100.00"`). Anything that
/// does not read as a finite number is treated as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

fn lenient_total<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?.unwrap_or(0.0))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
