//! Interactive prompts behind the CLI commands.

use std::fmt;
use std::path::Path;

use chrono::{Local, Utc};
use inquire::{Confirm, CustomType, DateSelect, Select, Text};
use uuid::Uuid;

use crate::draft::{ItemEdit, QuoteDraft};
use crate::error::{QuoteError, Result};
use crate::model::{
    Client, Company, DEFAULT_PRIMARY_COLOR, DEFAULT_TAX_RATE, Plan, Product, Profile, Quote,
        QuoteStatus,
};
use crate::pricing::format_money;
use crate::report;
use crate::store::Store;

const NEW_CLIENT_OPT: &str = "➕ Add New Client";
const NO_CLIENT_OPT: &str = "(No client)";

// ==========================================
// Input helpers
// ==========================================

fn optional_text(prompt: &str, current: Option<&str>) -> Result<Option<String>> {
    let input = Text::new(prompt).with_default(current.unwrap_or("")).prompt()?;
    let trimmed = input.trim();
    Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
}

fn required_text(prompt: &str, current: Option<&str>) -> Result<String> {
    loop {
        if let Some(value) = optional_text(prompt, current)? {
            return Ok(value);
        }
        println!("⚠️  This field is required.");
    }
}

fn number(prompt: &str, default: f64) -> Result<f64> {
    Ok(CustomType::<f64>::new(prompt)
        .with_default(default)
        .with_error_message("Please type a number")
        .prompt()?)
}

// ==========================================
// 1. Profile & Company
// ==========================================

/// Loads the local profile, creating it on first use.
pub fn ensure_profile(store: &Store) -> Result<Profile> {
    if let Some(profile) = store.load_profile()? {
        return Ok(profile);
    }
    println!("\n--- Welcome! Let's create your profile ---");
    let email = required_text("Your Email:", None)?;
    let full_name = optional_text("Full Name (Optional):", None)?;

    let now = Utc::now();
    let profile = Profile {
        id: Uuid::new_v4(),
        email,
        full_name,
        plan: Plan::Free,
        created_at: now,
        updated_at: now,
    };
    store.save_profile(&profile)?;
    println!("✅ Profile created.");
    Ok(profile)
}

pub fn edit_profile(store: &Store, mut profile: Profile) -> Result<Profile> {
    println!("\n--- Profile ({} plan) ---", profile.plan);
    profile.email = required_text("Email:", Some(&profile.email))?;
    profile.full_name = optional_text("Full Name:", profile.full_name.as_deref())?;
    profile.updated_at = Utc::now();
    store.save_profile(&profile)?;
    println!("✅ Profile saved.");
    Ok(profile)
}

/// Company setup when `existing` is None, settings edit otherwise.
pub fn company_wizard(
    store: &Store,
    profile: &Profile,
    existing: Option<Company>,
) -> Result<Company> {
    let title = if existing.is_some() { "Company Settings" } else { "Set Up Your Company" };
    println!("\n--- {} ---", title);
    let current = existing.as_ref();

    let name = required_text("Company Name:", current.map(|c| c.name.as_str()))?;
    let email =
        optional_text("Company Email (Optional):", current.and_then(|c| c.email.as_deref()))?;
    let phone = optional_text("Phone (Optional):", current.and_then(|c| c.phone.as_deref()))?;
    let address = optional_text("Address (Optional):", current.and_then(|c| c.address.as_deref()))?;
    let primary_color = Text::new("Brand Color (hex):")
        .with_default(current.map(|c| c.primary_color.as_str()).unwrap_or(DEFAULT_PRIMARY_COLOR))
        .prompt()?;
    let default_tax = current.map(|c| c.tax_rate).unwrap_or(DEFAULT_TAX_RATE);
    let tax_rate = number("Default Tax Rate %:", default_tax)?;

    let now = Utc::now();
    let mut company = Company {
        id: current.map(|c| c.id).unwrap_or_else(Uuid::new_v4),
        user_id: profile.id,
        name,
        email,
        phone,
        address,
        logo_url: current.and_then(|c| c.logo_url.clone()),
        primary_color: primary_color.trim().to_string(),
        tax_rate,
        created_at: current.map(|c| c.created_at).unwrap_or(now),
        updated_at: now,
    };

    if let Some(path) = optional_text("Logo file to upload (Optional, Enter to skip):", None)? {
        company.logo_url = Some(store.upload_logo(profile.id, Path::new(&path))?);
        println!("🖼️  Logo uploaded.");
    }

    store.save_company(&company)?;
    println!("✅ Company saved: {}", company.name);
    Ok(company)
}

pub fn require_company(store: &Store, profile: &Profile) -> Result<Company> {
    match store.load_company(profile.id)? {
        Some(company) => Ok(company),
        None => {
            println!("ℹ️  No company profile yet.");
            company_wizard(store, profile, None)
        }
    }
}

pub fn upload_logo(store: &Store, profile: &Profile, path: &Path) -> Result<Company> {
    let mut company = require_company(store, profile)?;
    company.logo_url = Some(store.upload_logo(profile.id, path)?);
    company.updated_at = Utc::now();
    store.save_company(&company)?;
    Ok(company)
}

// ==========================================
// 2. Clients
// ==========================================

pub fn client_wizard(store: &Store, user_id: Uuid, existing: Option<&Client>) -> Result<Client> {
    let title = if existing.is_some() { "Editing Client" } else { "Creating New Client" };
    println!("\n--- {} ---", title);

    let name = required_text("Client Name:", existing.map(|c| c.name.as_str()))?;
    let company =
        optional_text("Company (Optional):", existing.and_then(|c| c.company.as_deref()))?;
    let email =
        optional_text("Client Email (Optional):", existing.and_then(|c| c.email.as_deref()))?;
    let phone = optional_text("Phone (Optional):", existing.and_then(|c| c.phone.as_deref()))?;

    let now = Utc::now();
    let client = Client {
        id: existing.map(|c| c.id).unwrap_or_else(Uuid::new_v4),
        user_id,
        name,
        company,
        email,
        phone,
        created_at: existing.map(|c| c.created_at).unwrap_or(now),
        updated_at: now,
    };
    store.save(&client)?;
    println!("✅ Client saved: {}", client.name);
    Ok(client)
}

struct ClientOption(Client);

impl fmt::Display for ClientOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.label())
    }
}

pub fn select_client(store: &Store, user_id: Uuid, prompt: &str) -> Result<Option<Client>> {
    let clients = store.clients(user_id, None)?;
    if clients.is_empty() {
        println!("(No clients yet)");
        return Ok(None);
    }
    let options: Vec<ClientOption> = clients.into_iter().map(ClientOption).collect();
    Ok(Some(Select::new(prompt, options).prompt()?.0))
}

pub fn delete_client(store: &Store, user_id: Uuid) -> Result<()> {
    let Some(client) = select_client(store, user_id, "Select Client to DELETE:")? else {
        return Ok(());
    };
    if Confirm::new(&format!("Delete {}?", client.name)).with_default(false).prompt()? {
        store.delete::<Client>(user_id, client.id)?;
        println!("🗑️  Client deleted.");
    }
    Ok(())
}

// ==========================================
// 3. Products
// ==========================================

pub fn product_wizard(
    store: &Store,
    user_id: Uuid,
    default_tax: f64,
    existing: Option<&Product>,
) -> Result<Product> {
    println!("\n--- {} ---", if existing.is_some() { "Editing Product" } else { "New Product" });

    let name = required_text("Product Name:", existing.map(|p| p.name.as_str()))?;
    let description =
        optional_text("Description (Optional):", existing.and_then(|p| p.description.as_deref()))?;
    let price = number("Price ($):", existing.map(|p| p.price).unwrap_or(0.0))?;
    let unit = Text::new("Unit:")
        .with_default(existing.map(|p| p.unit.as_str()).unwrap_or("unit"))
        .prompt()?;
    let sku = optional_text("SKU (Optional):", existing.and_then(|p| p.sku.as_deref()))?;
    let tax = number("Tax %:", existing.map(|p| p.tax).unwrap_or(default_tax))?;

    let product = Product {
        id: existing.map(|p| p.id).unwrap_or_else(Uuid::new_v4),
        user_id,
        name,
        description,
        price,
        unit,
        sku,
        tax,
        created_at: existing.map(|p| p.created_at).unwrap_or_else(Utc::now),
    };
    store.save(&product)?;
    println!("✅ Product saved: {}", product.name);
    Ok(product)
}

struct ProductOption(Product);

impl fmt::Display for ProductOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, format_money(self.0.price))
    }
}

pub fn select_product(store: &Store, user_id: Uuid, prompt: &str) -> Result<Option<Product>> {
    let products = store.products(user_id, None)?;
    if products.is_empty() {
        println!("(No products in the catalog yet)");
        return Ok(None);
    }
    let options: Vec<ProductOption> = products.into_iter().map(ProductOption).collect();
    Ok(Some(Select::new(prompt, options).prompt()?.0))
}

pub fn delete_product(store: &Store, user_id: Uuid) -> Result<()> {
    let Some(product) = select_product(store, user_id, "Select Product to DELETE:")? else {
        return Ok(());
    };
    if Confirm::new(&format!("Delete {}?", product.name)).with_default(false).prompt()? {
        store.delete::<Product>(user_id, product.id)?;
        println!("🗑️  Product deleted.");
    }
    Ok(())
}

// ==========================================
// 4. Quotes
// ==========================================

struct QuoteOption(Quote);

impl fmt::Display for QuoteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.0.number_or_draft(),
            self.0.issue_date.format("%Y-%m-%d"),
            self.0.status.as_str().to_uppercase(),
            format_money(self.0.totals().total)
        )
    }
}

pub fn select_quote(store: &Store, user_id: Uuid, prompt: &str) -> Result<Option<Quote>> {
    let quotes = store.quotes(user_id, None)?;
    if quotes.is_empty() {
        println!("❌ No quotes found.");
        return Ok(None);
    }
    let options: Vec<QuoteOption> = quotes.into_iter().map(QuoteOption).collect();
    Ok(Some(Select::new(prompt, options).with_page_size(10).prompt()?.0))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EditorAction {
    AddItem,
    AddFromCatalog,
    EditItem,
    RemoveItem,
    SetClient,
    SetDates,
    SetDiscount,
    SetTax,
    Save,
    Discard,
}

impl fmt::Display for EditorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EditorAction::AddItem => "➕ Add empty item",
            EditorAction::AddFromCatalog => "📦 Add from catalog",
            EditorAction::EditItem => "✏️  Edit item",
            EditorAction::RemoveItem => "🗑️  Remove item",
            EditorAction::SetClient => "👤 Set client",
            EditorAction::SetDates => "📅 Set dates",
            EditorAction::SetDiscount => "🏷️  Set discount %",
            EditorAction::SetTax => "🧾 Set tax %",
            EditorAction::Save => "💾 Save",
            EditorAction::Discard => "❌ Discard changes",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy)]
enum ItemField {
    Name,
    Description,
    Quantity,
    UnitPrice,
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemField::Name => "Name",
            ItemField::Description => "Description",
            ItemField::Quantity => "Quantity",
            ItemField::UnitPrice => "Unit price",
        })
    }
}

struct ItemOption {
    id: Uuid,
    label: String,
}

impl fmt::Display for ItemOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn pick_item(draft: &QuoteDraft, prompt: &str) -> Result<Option<Uuid>> {
    if draft.items.is_empty() {
        println!("(No items yet)");
        return Ok(None);
    }
    let options: Vec<ItemOption> = draft
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| ItemOption {
            id: item.id,
            label: format!(
                "{}. {} ({})",
                idx + 1,
                if item.name.is_empty() { "(unnamed)" } else { item.name.as_str() },
                format_money(item.line_total())
            ),
        })
        .collect();
    Ok(Some(Select::new(prompt, options).prompt()?.id))
}

fn edit_item(draft: &mut QuoteDraft, id: Uuid) -> Result<()> {
    let Some(item) = draft.items.iter().find(|i| i.id == id).cloned() else {
        return Ok(());
    };
    let fields =
        vec![ItemField::Name, ItemField::Description, ItemField::Quantity, ItemField::UnitPrice];
    let edit = match Select::new("Field:", fields).prompt()? {
        ItemField::Name => ItemEdit::Name(Text::new("Name:").with_default(&item.name).prompt()?),
        ItemField::Description => {
            let description = Text::new("Description:").with_default(&item.description).prompt()?;
            ItemEdit::Description(description)
        }
        ItemField::Quantity => ItemEdit::Quantity(number("Quantity:", item.quantity)?),
        ItemField::UnitPrice => ItemEdit::UnitPrice(number("Unit price ($):", item.unit_price)?),
    };
    draft.update_item(id, edit);
    Ok(())
}

enum ClientChoice {
    New,
    Nobody,
    Existing(Client),
}

impl fmt::Display for ClientChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientChoice::New => f.write_str(NEW_CLIENT_OPT),
            ClientChoice::Nobody => f.write_str(NO_CLIENT_OPT),
            ClientChoice::Existing(client) => f.write_str(&client.label()),
        }
    }
}

fn client_choices(clients: Vec<Client>) -> Vec<ClientChoice> {
    let mut options = vec![ClientChoice::New, ClientChoice::Nobody];
    options.extend(clients.into_iter().map(ClientChoice::Existing));
    options
}

fn choose_client(store: &Store, user_id: Uuid, draft: &mut QuoteDraft) -> Result<()> {
    let options = client_choices(store.clients(user_id, None)?);
    let choice = Select::new("Please Select Client (Type to Filter):", options).prompt()?;
    draft.client_id = match choice {
        ClientChoice::New => Some(client_wizard(store, user_id, None)?.id),
        ClientChoice::Nobody => None,
        ClientChoice::Existing(client) => Some(client.id),
    };
    Ok(())
}

fn choose_dates(draft: &mut QuoteDraft) -> Result<()> {
    draft.issue_date = DateSelect::new("Issue Date:").with_default(draft.issue_date).prompt()?;
    draft.valid_until = if Confirm::new("Set a 'valid until' date?")
        .with_default(draft.valid_until.is_some())
        .prompt()?
    {
        let default = draft.valid_until.unwrap_or(draft.issue_date + chrono::Duration::days(30));
        Some(DateSelect::new("Valid Until:").with_default(default).prompt()?)
    } else {
        None
    };
    Ok(())
}

fn client_name(store: &Store, user_id: Uuid, draft: &QuoteDraft) -> Result<String> {
    Ok(match draft.client_id {
        Some(id) => store
            .get_owned::<Client>(user_id, id)?
            .map(|c| c.label())
            .unwrap_or_else(|| "(missing client)".into()),
        None => "(no client)".to_string(),
    })
}

/// Runs the quote editor. Returns the saved quote, or None when discarded.
pub fn quote_editor(
    store: &Store,
    profile: &Profile,
    company: &Company,
    existing: Option<Quote>,
) -> Result<Option<Quote>> {
    let mut draft = match &existing {
        Some(quote) => QuoteDraft::from_quote(quote),
        None => QuoteDraft::new(Local::now().date_naive(), company.tax_rate),
    };

    if draft.is_new() {
        choose_client(store, profile.id, &mut draft)?;
    }

    let actions = vec![
        EditorAction::AddItem,
        EditorAction::AddFromCatalog,
        EditorAction::EditItem,
        EditorAction::RemoveItem,
        EditorAction::SetClient,
        EditorAction::SetDates,
        EditorAction::SetDiscount,
        EditorAction::SetTax,
        EditorAction::Save,
        EditorAction::Discard,
    ];

    loop {
        println!(
            "\n--- {} {} | Client: {} ---",
            if draft.is_new() { "New Quote" } else { "Editing" },
            draft.quote_number.as_deref().unwrap_or("DRAFT"),
            client_name(store, profile.id, &draft)?
        );
        let totals = draft.totals();
        report::print_draft(&draft.items, &totals, draft.discount_percent, draft.tax_percent);

        match Select::new("Action:", actions.clone()).with_page_size(10).prompt()? {
            EditorAction::AddItem => {
                let id = draft.add_item();
                draft.update_item(id, ItemEdit::Name(Text::new("Item name:").prompt()?));
                let quantity = number("Quantity:", 1.0)?;
                draft.update_item(id, ItemEdit::Quantity(quantity));
                let price = number("Unit price ($):", 0.0)?;
                draft.update_item(id, ItemEdit::UnitPrice(price));
            }
            EditorAction::AddFromCatalog => {
                if let Some(product) = select_product(store, profile.id, "Select product:")? {
                    draft.add_product(&product);
                }
            }
            EditorAction::EditItem => {
                if let Some(id) = pick_item(&draft, "Edit which item?")? {
                    edit_item(&mut draft, id)?;
                }
            }
            EditorAction::RemoveItem => {
                if let Some(id) = pick_item(&draft, "Remove which item?")? {
                    draft.remove_item(id);
                }
            }
            EditorAction::SetClient => choose_client(store, profile.id, &mut draft)?,
            EditorAction::SetDates => choose_dates(&mut draft)?,
            EditorAction::SetDiscount => {
                draft.discount_percent = number("Discount %:", draft.discount_percent)?
            }
            EditorAction::SetTax => draft.tax_percent = number("Tax %:", draft.tax_percent)?,
            EditorAction::Save => break,
            EditorAction::Discard => {
                if Confirm::new("Discard this quote?").with_default(false).prompt()? {
                    println!("Quote discarded.");
                    return Ok(None);
                }
            }
        }
    }

    let quote = draft.into_quote(existing.as_ref(), profile.id, Some(company.id), |date| {
        store.next_quote_number(profile.id, date)
    })?;

    store.save(&quote)?;
    println!("✅ Quote {} saved ({}).", quote.number_or_draft(), format_money(quote.totals().total));
    Ok(Some(quote))
}

pub fn change_status(store: &Store, user_id: Uuid) -> Result<()> {
    let Some(quote) = select_quote(store, user_id, "Select Quote:")? else {
        return Ok(());
    };
    let status = Select::new("New Status:", QuoteStatus::ALL.to_vec()).prompt()?;
    let updated = store.set_quote_status(user_id, quote.id, status)?;
    println!("✅ {} is now {}.", updated.number_or_draft(), status.as_str().to_uppercase());
    Ok(())
}

pub fn delete_quote(store: &Store, user_id: Uuid) -> Result<()> {
    let Some(quote) = select_quote(store, user_id, "Select Quote to DELETE:")? else {
        return Ok(());
    };
    let prompt = format!("Delete quote {}?", quote.number_or_draft());
    if Confirm::new(&prompt).with_default(false).prompt()? {
        if !store.delete::<Quote>(user_id, quote.id)? {
            return Err(QuoteError::NotFound(format!("quote {}", quote.number_or_draft())));
        }
        println!("🗑️  Quote deleted.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(name: &str, company: Option<&str>) -> Client {
        Client {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            company: company.map(Into::into),
            email: None,
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn same_label_clients_keep_their_own_ids() {
        let first = client("Sam Lee", Some("Acme"));
        let second = client("Sam Lee", Some("Acme"));
        let ids = [first.id, second.id];

        let options = client_choices(vec![first, second]);
        assert_eq!(options.len(), 4);
        assert_eq!(options[0].to_string(), NEW_CLIENT_OPT);
        assert_eq!(options[1].to_string(), NO_CLIENT_OPT);
        assert_eq!(options[2].to_string(), options[3].to_string());

        let picked: Vec<Uuid> = options
            .iter()
            .filter_map(|o| match o {
                ClientChoice::Existing(c) => Some(c.id),
                _ => None,
            })
            .collect();
        assert_eq!(picked, ids);
    }
}
