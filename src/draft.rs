use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{LineItem, Product, Quote, QuoteStatus};
use crate::pricing::{QuoteTotals, compute_totals};

/// A single field change coming from the item editor.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEdit {
    Name(String),
    Description(String),
    Quantity(f64),
    UnitPrice(f64),
}

/// In-progress quote owned by one editing session.
#[derive(Debug, Clone)]
pub struct QuoteDraft {
    pub quote_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub quote_number: Option<String>,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub discount_percent: f64,
    pub tax_percent: f64,
    pub items: Vec<LineItem>,
}

impl QuoteDraft {
    pub fn new(issue_date: NaiveDate, tax_percent: f64) -> Self {
        Self {
            quote_id: None,
            client_id: None,
            quote_number: None,
            issue_date,
            valid_until: None,
            discount_percent: 0.0,
            tax_percent,
            items: Vec::new(),
        }
    }

    pub fn from_quote(quote: &Quote) -> Self {
        Self {
            quote_id: Some(quote.id),
            client_id: quote.client_id,
            quote_number: quote.quote_number.clone(),
            issue_date: quote.issue_date,
            valid_until: quote.valid_until,
            discount_percent: quote.discount_percent,
            tax_percent: quote.tax_percent,
            items: quote.items.clone(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.quote_id.is_none()
    }

    pub fn add_item(&mut self) -> Uuid {
        let item = LineItem::empty();
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn add_product(&mut self, product: &Product) -> Uuid {
        let item = LineItem::from_product(product);
        let id = item.id;
        self.items.push(item);
        id
    }

    /// Applies `edit` to the item with `id`. Returns false when no such item exists.
    pub fn update_item(&mut self, id: Uuid, edit: ItemEdit) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        match edit {
            ItemEdit::Name(name) => item.name = name,
            ItemEdit::Description(description) => item.description = description,
            ItemEdit::Quantity(quantity) => item.quantity = quantity,
            ItemEdit::UnitPrice(price) => item.unit_price = price,
        }
        true
    }

    pub fn remove_item(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    pub fn totals(&self) -> QuoteTotals {
        compute_totals(&self.items, self.discount_percent, self.tax_percent)
    }

    /// Builds the record to persist.
    ///
    /// `existing` is the stored quote being edited, if any. A number is only
    /// generated (through `next_number`) when the draft has none. Saving always
    /// puts the quote back into `draft` status.
    pub fn into_quote(
        self,
        existing: Option<&Quote>,
        user_id: Uuid,
        company_id: Option<Uuid>,
        next_number: impl FnOnce(NaiveDate) -> Result<String>,
    ) -> Result<Quote> {
        let now = Utc::now();
        let quote_number = match self.quote_number.filter(|n| !n.trim().is_empty()) {
            Some(number) => number,
            None => next_number(self.issue_date)?,
        };

        Ok(Quote {
            id: existing.map(|q| q.id).or(self.quote_id).unwrap_or_else(Uuid::new_v4),
            user_id,
            company_id: company_id.or_else(|| existing.and_then(|q| q.company_id)),
            client_id: self.client_id,
            quote_number: Some(quote_number),
            issue_date: self.issue_date,
            valid_until: self.valid_until,
            status: QuoteStatus::Draft,
            discount_percent: self.discount_percent,
            tax_percent: self.tax_percent,
            created_at: existing.map(|q| q.created_at).unwrap_or(now),
            updated_at: now,
            items: self.items,
        })
    }
}
