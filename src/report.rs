use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use uuid::Uuid;

use crate::model::{Client, LineItem, Quote, QuoteStatus};
use crate::pricing::{QuoteTotals, format_decimal, format_discount, format_money};

const GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };
const RED: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const BLUE: Color = Color::Rgb { r: 29, g: 78, b: 216 };

/// Accepted vs still-open (draft or sent) amounts.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Split {
    pub accepted: f64,
    pub open: f64,
}

impl Split {
    fn add(&mut self, status: QuoteStatus, amount: f64) {
        match status {
            QuoteStatus::Accepted => self.accepted += amount,
            QuoteStatus::Draft | QuoteStatus::Sent => self.open += amount,
            QuoteStatus::Rejected => {}
        }
    }

    pub fn total(&self) -> f64 {
        self.accepted + self.open
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StatusSlice {
    pub count: usize,
    pub amount: f64,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub year: i32,
    pub monthly: BTreeMap<(i32, u32), Split>,
    pub by_client: Vec<(String, Split)>,
    pub by_status: BTreeMap<QuoteStatus, StatusSlice>,
}

impl Summary {
    pub fn quote_count(&self) -> usize {
        self.by_status.values().map(|s| s.count).sum()
    }
}

/// Aggregates the quotes issued in `year`. Rejected quotes only show up in the
/// status distribution.
pub fn summarize(quotes: &[Quote], clients: &[Client], year: i32) -> Summary {
    let names: HashMap<Uuid, &str> = clients.iter().map(|c| (c.id, c.name.as_str())).collect();
    let mut summary = Summary { year, ..Default::default() };
    let mut client_totals: BTreeMap<String, Split> = BTreeMap::new();

    for quote in quotes.iter().filter(|q| q.issue_date.year() == year) {
        let total = quote.totals().total;

        let slice = summary.by_status.entry(quote.status).or_default();
        slice.count += 1;
        slice.amount += total;

        let month_key = (quote.issue_date.year(), quote.issue_date.month());
        summary.monthly.entry(month_key).or_default().add(quote.status, total);

        let client = quote
            .client_id
            .and_then(|id| names.get(&id).copied())
            .unwrap_or("Unknown Client");
        client_totals.entry(client.to_string()).or_default().add(quote.status, total);
    }

    let mut by_client: Vec<_> = client_totals
        .into_iter()
        .filter(|(_, split)| split.total() != 0.0)
        .collect();
    by_client.sort_by(|a, b| b.1.total().total_cmp(&a.1.total()));
    summary.by_client = by_client;
    summary
}

fn money_cell(amount: f64, color: Color) -> Cell {
    let cell = Cell::new(format_money(amount)).set_alignment(CellAlignment::Right);
    if amount > 0.0 { cell.fg(color) } else { cell }
}

fn status_cell(status: QuoteStatus) -> Cell {
    let cell = Cell::new(status.as_str().to_uppercase());
    match status {
        QuoteStatus::Accepted => cell.fg(GREEN),
        QuoteStatus::Sent => cell.fg(BLUE),
        QuoteStatus::Rejected => cell.fg(RED),
        QuoteStatus::Draft => cell,
    }
}

pub fn print_summary(summary: &Summary) {
    if summary.quote_count() == 0 {
        println!("No quotes issued in {}.", summary.year);
        return;
    }

    // Monthly
    let mut table = Table::new();
    table.set_header(vec!["Month", "Accepted", "Open", "Total"]);
    let mut grand = Split::default();
    for ((year, month), split) in summary.monthly.iter().rev() {
        let month_str = NaiveDate::from_ymd_opt(*year, *month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", year, month));
        table.add_row(vec![
            Cell::new(month_str),
            money_cell(split.accepted, GREEN),
            money_cell(split.open, RED),
            Cell::new(format_money(split.total())).set_alignment(CellAlignment::Right),
        ]);
        grand.accepted += split.accepted;
        grand.open += split.open;
    }
    table.add_row(vec![
        Cell::new(format!("Total ({})", summary.year)).add_attribute(Attribute::Bold),
        money_cell(grand.accepted, GREEN).add_attribute(Attribute::Bold),
        money_cell(grand.open, RED).add_attribute(Attribute::Bold),
        Cell::new(format_money(grand.total()))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
    ]);
    println!("\n--- Monthly Quote Summary ({}) ---", summary.year);
    println!("{table}");

    // Clients
    let mut client_table = Table::new();
    client_table.set_header(vec!["Client", "Accepted", "Open", "Total"]);
    for (client, split) in &summary.by_client {
        client_table.add_row(vec![
            Cell::new(client),
            money_cell(split.accepted, GREEN),
            money_cell(split.open, RED),
            Cell::new(format_money(split.total())).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n--- Client Summary ({}) ---", summary.year);
    println!("{client_table}");

    // Status distribution
    let count = summary.quote_count() as f64;
    let mut status_table = Table::new();
    status_table.set_header(vec!["Status", "Quotes", "Share", "Amount"]);
    for (status, slice) in &summary.by_status {
        status_table.add_row(vec![
            status_cell(*status),
            Cell::new(slice.count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}%", slice.count as f64 / count * 100.0))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_money(slice.amount)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n--- Status Distribution ({}) ---", summary.year);
    println!("{status_table}");
}

pub fn print_quotes(quotes: &[Quote], clients: &[Client]) {
    if quotes.is_empty() {
        println!("(None found)");
        return;
    }
    let names: HashMap<Uuid, &str> = clients.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut table = Table::new();
    table.set_header(vec!["Number", "Client", "Issued", "Valid Until", "Status", "Total"]);
    for quote in quotes {
        let client = quote.client_id.and_then(|id| names.get(&id).copied()).unwrap_or("-");
        table.add_row(vec![
            Cell::new(quote.number_or_draft()),
            Cell::new(client),
            Cell::new(quote.issue_date.format("%Y-%m-%d")),
            Cell::new(
                quote
                    .valid_until
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            status_cell(quote.status),
            Cell::new(format_money(quote.totals().total)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

pub fn print_clients(clients: &[Client]) {
    if clients.is_empty() {
        println!("(None found)");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Name", "Company", "Email", "Phone"]);
    for c in clients {
        table.add_row(vec![
            c.name.as_str(),
            c.company.as_deref().unwrap_or("-"),
            c.email.as_deref().unwrap_or("-"),
            c.phone.as_deref().unwrap_or("-"),
        ]);
    }
    println!("{table}");
}

pub fn print_products(products: &[crate::model::Product]) {
    if products.is_empty() {
        println!("(None found)");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Name", "SKU", "Unit", "Price", "Description"]);
    for p in products {
        table.add_row(vec![
            Cell::new(&p.name),
            Cell::new(p.sku.as_deref().unwrap_or("-")),
            Cell::new(&p.unit),
            Cell::new(format_money(p.price)).set_alignment(CellAlignment::Right),
            Cell::new(p.description.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
}

/// Items and running totals, re-printed by the editor after every change.
pub fn print_draft(
    items: &[LineItem],
    totals: &QuoteTotals,
    discount_percent: f64,
    tax_percent: f64,
) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Item", "Qty", "Price", "Total"]);
    for (idx, item) in items.iter().enumerate() {
        let name = if item.name.is_empty() { "(unnamed)" } else { item.name.as_str() };
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(name),
            Cell::new(format_decimal(item.quantity)).set_alignment(CellAlignment::Right),
            Cell::new(format_money(item.unit_price)).set_alignment(CellAlignment::Right),
            Cell::new(format_money(item.line_total())).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    let mut totals_table = Table::new();
    let right = |amount: f64| Cell::new(format_money(amount)).set_alignment(CellAlignment::Right);
    totals_table.add_row(vec![Cell::new("Subtotal"), right(totals.subtotal)]);
    if discount_percent != 0.0 {
        totals_table.add_row(vec![
            Cell::new(format!("Discount ({}%)", format_decimal(discount_percent))),
            Cell::new(format_discount(totals.discount_amount)).set_alignment(CellAlignment::Right),
        ]);
    }
    totals_table.add_row(vec![
        Cell::new(format!("Tax ({}%)", format_decimal(tax_percent))),
        right(totals.tax_amount),
    ]);
    totals_table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        right(totals.total).add_attribute(Attribute::Bold),
    ]);
    println!("{totals_table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(name: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            company: None,
            email: None,
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn quote(
        client: Option<&Client>,
        date: (i32, u32, u32),
        amount: f64,
        status: QuoteStatus,
    ) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            company_id: None,
            client_id: client.map(|c| c.id),
            quote_number: None,
            issue_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            valid_until: None,
            status,
            discount_percent: 0.0,
            tax_percent: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![LineItem { quantity: 1.0, unit_price: amount, ..LineItem::empty() }],
        }
    }

    #[test]
    fn groups_by_month_client_and_status() {
        let acme = client("Acme");
        let globex = client("Globex");
        let quotes = vec![
            quote(Some(&acme), (2026, 1, 5), 100.0, QuoteStatus::Accepted),
            quote(Some(&acme), (2026, 1, 20), 50.0, QuoteStatus::Sent),
            quote(Some(&globex), (2026, 3, 2), 400.0, QuoteStatus::Draft),
            quote(Some(&globex), (2026, 3, 9), 70.0, QuoteStatus::Rejected),
            quote(None, (2026, 3, 9), 5.0, QuoteStatus::Accepted),
            quote(Some(&acme), (2025, 12, 31), 999.0, QuoteStatus::Accepted),
        ];
        let summary = summarize(&quotes, &[acme, globex], 2026);

        assert_eq!(summary.quote_count(), 5);
        assert_eq!(summary.monthly[&(2026, 1)], Split { accepted: 100.0, open: 50.0 });
        assert_eq!(summary.monthly[&(2026, 3)], Split { accepted: 5.0, open: 400.0 });
        assert!(!summary.monthly.contains_key(&(2025, 12)));

        let clients: Vec<_> = summary.by_client.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(clients, vec!["Globex", "Acme", "Unknown Client"]);

        let rejected = summary.by_status[&QuoteStatus::Rejected];
        assert_eq!(rejected, StatusSlice { count: 1, amount: 70.0 });
        assert_eq!(summary.by_status[&QuoteStatus::Accepted].count, 2);
    }

    #[test]
    fn empty_year_has_no_rows() {
        let summary = summarize(&[], &[], 2026);
        assert_eq!(summary.quote_count(), 0);
        assert!(summary.monthly.is_empty());
        assert!(summary.by_client.is_empty());
    }

    #[test]
    fn totals_include_discount_and_tax() {
        let mut q = quote(None, (2026, 6, 1), 100.0, QuoteStatus::Accepted);
        q.discount_percent = 10.0;
        q.tax_percent = 16.0;
        let summary = summarize(&[q], &[], 2026);
        assert!((summary.monthly[&(2026, 6)].accepted - 104.4).abs() < 1e-9);
    }
}
