use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PRIMARY_COLOR: &str = "#3b82f6";
pub const DEFAULT_TAX_RATE: f64 = 16.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Free => write!(f, "free"),
            Plan::Pro => write!(f, "pro"),
        }
    }
}

/// The local account every other record is keyed by.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Company {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64, // percent, e.g. 16.0
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_primary_color() -> String {
    DEFAULT_PRIMARY_COLOR.to_string()
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// "Name - Company" as shown in pickers.
    pub fn label(&self) -> String {
        match &self.company {
            Some(company) => format!("{} - {}", self.name, company),
            None => self.name.clone(),
        }
    }
}

/// Catalog entry that can be dropped into a quote as a line item.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub tax: f64,
    pub created_at: DateTime<Utc>,
}

fn default_unit() -> String {
    "unit".to_string()
}

#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 4] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl LineItem {
    /// Fresh editor row: quantity 1, price 0.
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            description: String::new(),
            quantity: 1.0,
            unit_price: 0.0,
        }
    }

    pub fn from_product(product: &Product) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            quantity: 1.0,
            unit_price: product.price,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// A saved quote. Totals are never stored; see `pricing::compute_totals`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Quote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub quote_number: Option<String>,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub status: QuoteStatus,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub tax_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Kept last so TOML writes the [[items]] tables after plain keys.
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Quote {
    pub fn number_or_draft(&self) -> &str {
        self.quote_number.as_deref().unwrap_or("DRAFT")
    }

    pub fn totals(&self) -> crate::pricing::QuoteTotals {
        crate::pricing::compute_totals(&self.items, self.discount_percent, self.tax_percent)
    }
}
