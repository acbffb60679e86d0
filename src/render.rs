use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use slug::slugify;
use tera::{Context, Tera};

use crate::error::Result;
use crate::model::{Client, Company, Quote};
use crate::pricing::{format_amount, format_decimal, format_discount};

pub const PREVIEW_TEMPLATE: &str = "quote.html";
pub const EMAIL_TEMPLATE: &str = "quote_email.html";

// Embedded so a fresh data root always has something to render with
const DEFAULT_PREVIEW: &str = include_str!("../templates/quote.html");
const DEFAULT_EMAIL: &str = include_str!("../templates/quote_email.html");
const TEMPLATES: [(&str, &str); 2] =
    [(PREVIEW_TEMPLATE, DEFAULT_PREVIEW), (EMAIL_TEMPLATE, DEFAULT_EMAIL)];

/// Everything a quote template can see. Money is pre-formatted to cents.
#[derive(Debug, Serialize)]
pub struct QuoteContext {
    pub number: String,
    pub issue_date: String,
    pub valid_until: String,
    pub status: String,
    pub company: CompanyView,
    pub client: Option<ClientView>,
    pub items: Vec<ItemView>,
    pub discount_percent: String,
    pub tax_percent: String,
    pub show_discount: bool,
    pub totals: TotalsView,
}

#[derive(Debug, Serialize)]
pub struct CompanyView {
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub logo_url: String,
    pub primary_color: String,
}

#[derive(Debug, Serialize)]
pub struct ClientView {
    pub name: String,
    pub company: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub name: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Serialize)]
pub struct TotalsView {
    pub subtotal: String,
    pub discount_amount: String,
    /// Signed money string for the discount row, e.g. `-$25.00`.
    pub discount_line: String,
    pub taxable_amount: String,
    pub tax_amount: String,
    pub total: String,
}

impl QuoteContext {
    pub fn new(quote: &Quote, company: Option<&Company>, client: Option<&Client>) -> Self {
        let totals = quote.totals();
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        let company = match company {
            Some(c) => CompanyView {
                name: c.name.clone(),
                address: text(&c.address),
                email: text(&c.email),
                phone: text(&c.phone),
                logo_url: text(&c.logo_url),
                primary_color: c.primary_color.clone(),
            },
            None => CompanyView {
                name: "Your Company".to_string(),
                address: String::new(),
                email: String::new(),
                phone: String::new(),
                logo_url: String::new(),
                primary_color: crate::model::DEFAULT_PRIMARY_COLOR.to_string(),
            },
        };

        Self {
            number: quote.number_or_draft().to_string(),
            issue_date: quote.issue_date.format("%Y-%m-%d").to_string(),
            valid_until: quote
                .valid_until
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status: quote.status.to_string(),
            company,
            client: client.map(|c| ClientView {
                name: c.name.clone(),
                company: text(&c.company),
                email: text(&c.email),
            }),
            items: quote
                .items
                .iter()
                .map(|item| ItemView {
                    name: item.name.clone(),
                    description: item.description.clone(),
                    quantity: format_decimal(item.quantity),
                    unit_price: format_amount(item.unit_price),
                    line_total: format_amount(item.line_total()),
                })
                .collect(),
            discount_percent: format_decimal(quote.discount_percent),
            tax_percent: format_decimal(quote.tax_percent),
            show_discount: quote.discount_percent != 0.0,
            totals: TotalsView {
                subtotal: format_amount(totals.subtotal),
                discount_amount: format_amount(totals.discount_amount),
                discount_line: format_discount(totals.discount_amount),
                taxable_amount: format_amount(totals.taxable_amount),
                tax_amount: format_amount(totals.tax_amount),
                total: format_amount(totals.total),
            },
        }
    }
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Templates compiled into the binary.
    pub fn embedded() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    /// Templates from `<root>/templates`, seeded with the defaults on first use.
    pub fn from_data_root(root: &Path) -> Result<Self> {
        let template_dir = root.join("templates");
        fs::create_dir_all(&template_dir)?;

        for (name, default) in TEMPLATES {
            let path = template_dir.join(name);
            if !path.exists() {
                println!("✨ Initializing default template {}...", name);
                fs::write(&path, default)?;
            }
        }

        let glob = template_dir.join("*.html");
        let tera = Tera::new(&glob.to_string_lossy())?;
        Ok(Self { tera })
    }

    pub fn render_preview(&self, context: &QuoteContext) -> Result<String> {
        self.render(PREVIEW_TEMPLATE, context)
    }

    pub fn render_email(&self, context: &QuoteContext) -> Result<String> {
        self.render(EMAIL_TEMPLATE, context)
    }

    fn render(&self, template: &str, context: &QuoteContext) -> Result<String> {
        let context = Context::from_serialize(context)?;
        Ok(self.tera.render(template, &context)?)
    }
}

/// `<root>/output/<year>/<client-slug>/<number>.html`
pub fn preview_path(root: &Path, quote: &Quote, client: Option<&Client>) -> PathBuf {
    let client_dir = client.map(|c| slugify(&c.name)).unwrap_or_else(|| "no-client".to_string());
    root.join("output")
        .join(quote.issue_date.format("%Y").to_string())
        .join(client_dir)
        .join(format!("{}.html", slugify(quote.number_or_draft())))
}

pub fn write_preview(
    root: &Path,
    quote: &Quote,
    client: Option<&Client>,
    html: &str,
) -> Result<PathBuf> {
    let path = preview_path(root, quote, client);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, html)?;
    tracing::info!(path = %path.display(), "preview written");
    Ok(path)
}
