//! TOML file store under `<data_root>/data`.
//!
//! Layout:
//! - `profile.toml`, `company.toml`
//! - `clients/<id>.toml`, `products/<id>.toml`, `quotes/<id>.toml`
//!
//! Logos uploaded through [`Store::upload_logo`] land in `<data_root>/logos`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{QuoteError, Result};
use crate::model::{Client, Company, Plan, Product, Profile, Quote, QuoteStatus};

/// A record kept one-file-per-id inside its own directory.
pub trait Record: Serialize + DeserializeOwned {
    const DIR: &'static str;

    fn id(&self) -> Uuid;
    fn owner(&self) -> Uuid;
}

impl Record for Client {
    const DIR: &'static str = "clients";
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner(&self) -> Uuid {
        self.user_id
    }
}

impl Record for Product {
    const DIR: &'static str = "products";
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner(&self) -> Uuid {
        self.user_id
    }
}

impl Record for Quote {
    const DIR: &'static str = "quotes";
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the store below `data_root`.
    pub fn open(data_root: &Path) -> Result<Self> {
        let store = Self { root: data_root.to_path_buf() };
        for dir in [Client::DIR, Product::DIR, Quote::DIR] {
            fs::create_dir_all(store.data_dir().join(dir))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    fn record_path<T: Record>(&self, id: Uuid) -> PathBuf {
        self.data_dir().join(T::DIR).join(format!("{}.toml", id))
    }

    // ==========================================
    // Generic record access
    // ==========================================

    pub fn get<T: Record>(&self, id: Uuid) -> Result<Option<T>> {
        read_toml(&self.record_path::<T>(id))
    }

    /// Like [`Store::get`], but records owned by someone else read as missing.
    pub fn get_owned<T: Record>(&self, user_id: Uuid, id: Uuid) -> Result<Option<T>> {
        Ok(self.get::<T>(id)?.filter(|record| record.owner() == user_id))
    }

    /// Every record of type `T` owned by `user_id`, in directory order.
    pub fn list<T: Record>(&self, user_id: Uuid) -> Result<Vec<T>> {
        let dir = self.data_dir().join(T::DIR);
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "toml") {
                continue;
            }
            if let Some(record) = read_toml::<T>(&path)? {
                if record.owner() == user_id {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    pub fn save<T: Record>(&self, record: &T) -> Result<()> {
        let path = self.record_path::<T>(record.id());
        write_toml(&path, record)?;
        tracing::debug!(kind = T::DIR, id = %record.id(), "record saved");
        Ok(())
    }

    /// Removes the record if it belongs to `user_id`. Returns whether anything was deleted.
    pub fn delete<T: Record>(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        match self.get::<T>(id)? {
            Some(record) if record.owner() == user_id => {
                fs::remove_file(self.record_path::<T>(id))?;
                tracing::debug!(kind = T::DIR, %id, "record deleted");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ==========================================
    // Profile & company
    // ==========================================

    pub fn load_profile(&self) -> Result<Option<Profile>> {
        read_toml(&self.data_dir().join("profile.toml"))
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        write_toml(&self.data_dir().join("profile.toml"), profile)
    }

    /// Switches the plan of `user_id`. Returns false when no such profile exists.
    pub fn set_plan(&self, user_id: Uuid, plan: Plan) -> Result<bool> {
        match self.load_profile()? {
            Some(mut profile) if profile.id == user_id => {
                profile.plan = plan;
                profile.updated_at = Utc::now();
                self.save_profile(&profile)?;
                tracing::info!(user_id = %user_id, %plan, "plan updated");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn load_company(&self, user_id: Uuid) -> Result<Option<Company>> {
        let company: Option<Company> = read_toml(&self.data_dir().join("company.toml"))?;
        Ok(company.filter(|c| c.user_id == user_id))
    }

    pub fn save_company(&self, company: &Company) -> Result<()> {
        write_toml(&self.data_dir().join("company.toml"), company)
    }

    /// Copies a logo into `<root>/logos` and returns a URL it can be loaded from.
    pub fn upload_logo(&self, user_id: Uuid, source: &Path) -> Result<String> {
        if !source.is_file() {
            return Err(QuoteError::NotFound(format!("logo file {}", source.display())));
        }
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "png".to_string());

        let logos = self.root.join("logos");
        fs::create_dir_all(&logos)?;
        let target = logos.join(format!("{}-{}.{}", user_id, Uuid::new_v4().simple(), ext));
        fs::copy(source, &target)?;

        let absolute = fs::canonicalize(&target).unwrap_or(target);
        tracing::info!(path = %absolute.display(), "logo uploaded");
        Ok(format!("file://{}", absolute.display()))
    }

    // ==========================================
    // Typed listings
    // ==========================================

    /// Clients ordered by name, optionally narrowed by a case-insensitive search
    /// over name, company and email.
    pub fn clients(&self, user_id: Uuid, search: Option<&str>) -> Result<Vec<Client>> {
        let mut clients: Vec<Client> = self.list(user_id)?;
        if let Some(term) = search.map(str::to_lowercase).filter(|t| !t.is_empty()) {
            clients.retain(|c| {
                [Some(&c.name), c.company.as_ref(), c.email.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&term))
            });
        }
        clients.sort_by_key(|c| c.name.to_lowercase());
        Ok(clients)
    }

    /// Products ordered by name ascending, optionally narrowed by name/description.
    pub fn products(&self, user_id: Uuid, search: Option<&str>) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.list(user_id)?;
        if let Some(term) = search.map(str::to_lowercase).filter(|t| !t.is_empty()) {
            products.retain(|p| {
                p.name.to_lowercase().contains(&term)
                    || p.description.as_deref().is_some_and(|d| d.to_lowercase().contains(&term))
            });
        }
        products.sort_by_key(|p| p.name.to_lowercase());
        Ok(products)
    }

    /// Quotes newest first, optionally only those with `status`.
    pub fn quotes(&self, user_id: Uuid, status: Option<QuoteStatus>) -> Result<Vec<Quote>> {
        let mut quotes: Vec<Quote> = self.list(user_id)?;
        if let Some(status) = status {
            quotes.retain(|q| q.status == status);
        }
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quotes)
    }

    pub fn count_quotes(&self, user_id: Uuid) -> Result<usize> {
        Ok(self.list::<Quote>(user_id)?.len())
    }

    pub fn set_quote_status(&self, user_id: Uuid, id: Uuid, status: QuoteStatus) -> Result<Quote> {
        let mut quote = self
            .get_owned::<Quote>(user_id, id)?
            .ok_or_else(|| QuoteError::NotFound(format!("quote {}", id)))?;
        quote.status = status;
        quote.updated_at = Utc::now();
        self.save(&quote)?;
        Ok(quote)
    }

    pub fn next_quote_number(&self, user_id: Uuid, date: NaiveDate) -> Result<String> {
        let quotes: Vec<Quote> = self.list(user_id)?;
        Ok(next_quote_number(
            quotes.iter().filter_map(|q| q.quote_number.as_deref()),
            date,
        ))
    }
}

/// `Q<YYYYMMDD>-NN`, one past the highest index already used on `date`.
pub fn next_quote_number<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    date: NaiveDate,
) -> String {
    let prefix = format!("Q{}", date.format("%Y%m%d"));
    let pattern = format!(r"^{}-(\d+)$", regex::escape(&prefix));
    let Ok(re) = Regex::new(&pattern) else {
        return format!("{}-01", prefix);
    };

    let next_idx = existing
        .into_iter()
        .filter_map(|number| re.captures(number))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .map_or(1, |max| max + 1);

    format!("{}-{:02}", prefix, next_idx)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| QuoteError::Parse { path: path.to_path_buf(), source })
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineItem;
    use chrono::{Duration, Utc};

    fn client(user_id: Uuid, name: &str, company: Option<&str>) -> Client {
        Client {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            company: company.map(Into::into),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(user_id: Uuid, name: &str, description: Option<&str>) -> Product {
        Product {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            description: description.map(Into::into),
            price: 10.0,
            unit: "unit".into(),
            sku: None,
            tax: 0.0,
            created_at: Utc::now(),
        }
    }

    fn quote(user_id: Uuid, number: &str, age_days: i64) -> Quote {
        let created = Utc::now() - Duration::days(age_days);
        Quote {
            id: Uuid::new_v4(),
            user_id,
            company_id: None,
            client_id: None,
            quote_number: Some(number.into()),
            issue_date: created.date_naive(),
            valid_until: None,
            status: QuoteStatus::Draft,
            discount_percent: 0.0,
            tax_percent: 16.0,
            created_at: created,
            updated_at: created,
            items: vec![LineItem { quantity: 2.0, unit_price: 100.0, ..LineItem::empty() }],
        }
    }

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
            full_name: Some("Owner".into()),
            plan: Plan::Free,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn quote_round_trips_with_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        let mut saved = quote(user, "Q20260101-01", 0);
        saved.valid_until = NaiveDate::from_ymd_opt(2026, 2, 1);
        saved.items.push(LineItem { name: "Setup".into(), ..LineItem::empty() });
        store.save(&saved).unwrap();

        let loaded: Quote = store.get(saved.id).unwrap().unwrap();
        assert_eq!(loaded.items, saved.items);
        assert_eq!(loaded.valid_until, saved.valid_until);
        assert_eq!(loaded.totals(), saved.totals());
    }

    #[test]
    fn listings_are_scoped_to_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        store.save(&client(alice, "Acme", None)).unwrap();
        store.save(&client(bob, "Globex", None)).unwrap();

        let names: Vec<_> =
            store.clients(alice, None).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Acme"]);
        assert_eq!(store.count_quotes(alice).unwrap(), 0);
    }

    #[test]
    fn clients_sorted_and_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        store.save(&client(user, "zoe", Some("Initech"))).unwrap();
        store.save(&client(user, "Adam", None)).unwrap();
        store.save(&client(user, "Maria", Some("Acme Corp"))).unwrap();

        let names: Vec<_> =
            store.clients(user, None).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Adam", "Maria", "zoe"]);

        let hits = store.clients(user, Some("acme")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Maria");
    }

    #[test]
    fn products_sorted_by_name_and_searchable_by_description() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        store.save(&product(user, "Web Hosting", Some("Yearly plan"))).unwrap();
        store.save(&product(user, "Audit", None)).unwrap();

        let names: Vec<_> =
            store.products(user, None).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Audit", "Web Hosting"]);
        assert_eq!(store.products(user, Some("YEARLY")).unwrap().len(), 1);
    }

    #[test]
    fn quotes_newest_first_and_filtered_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        let old = quote(user, "Q-old", 10);
        let new = quote(user, "Q-new", 1);
        store.save(&old).unwrap();
        store.save(&new).unwrap();
        store.set_quote_status(user, old.id, QuoteStatus::Accepted).unwrap();

        let all = store.quotes(user, None).unwrap();
        assert_eq!(all[0].quote_number.as_deref(), Some("Q-new"));
        assert_eq!(all[1].quote_number.as_deref(), Some("Q-old"));

        let accepted = store.quotes(user, Some(QuoteStatus::Accepted)).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, old.id);
    }

    #[test]
    fn delete_respects_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        let q = quote(user, "Q1", 0);
        store.save(&q).unwrap();

        assert!(!store.delete::<Quote>(Uuid::new_v4(), q.id).unwrap());
        assert!(store.delete::<Quote>(user, q.id).unwrap());
        assert!(store.get::<Quote>(q.id).unwrap().is_none());
        assert!(!store.delete::<Quote>(user, q.id).unwrap());
    }

    #[test]
    fn owned_lookup_hides_other_users_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let owner = Uuid::new_v4();
        let c = client(owner, "Dana", None);
        store.save(&c).unwrap();

        assert!(store.get_owned::<Client>(Uuid::new_v4(), c.id).unwrap().is_none());
        assert_eq!(store.get_owned::<Client>(owner, c.id).unwrap().unwrap().name, "Dana");
    }

    #[test]
    fn status_change_on_missing_quote_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let err = store.set_quote_status(Uuid::new_v4(), Uuid::new_v4(), QuoteStatus::Sent);
        assert!(matches!(err, Err(QuoteError::NotFound(_))));
    }

    #[test]
    fn plan_only_changes_for_matching_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let owner = profile();
        store.save_profile(&owner).unwrap();

        assert!(!store.set_plan(Uuid::new_v4(), Plan::Pro).unwrap());
        assert!(store.set_plan(owner.id, Plan::Pro).unwrap());
        assert_eq!(store.load_profile().unwrap().unwrap().plan, Plan::Pro);
    }

    #[test]
    fn logo_upload_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let source = dir.path().join("brand.PNG");
        fs::write(&source, b"\x89PNG").unwrap();

        let url = store.upload_logo(Uuid::new_v4(), &source).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".png"));
        let copied = fs::read_dir(dir.path().join("logos")).unwrap().count();
        assert_eq!(copied, 1);

        assert!(store.upload_logo(Uuid::new_v4(), &dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn corrupt_record_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let id = Uuid::new_v4();
        fs::write(store.record_path::<Quote>(id), "not = [valid").unwrap();
        match store.get::<Quote>(id) {
            Err(QuoteError::Parse { path, .. }) => assert!(path.ends_with(format!("{}.toml", id))),
            other => panic!("expected parse error, got {:?}", other.map(|q| q.map(|q| q.id))),
        }
    }

    #[test]
    fn quote_numbers_continue_per_day() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(next_quote_number([], date), "Q20261018-01");
        let existing = ["Q20261018-01", "Q20261018-07", "Q20261017-09", "Q-1234", "Q20261018-xx"];
        assert_eq!(next_quote_number(existing, date), "Q20261018-08");
    }

    #[test]
    fn store_numbering_uses_saved_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let user = Uuid::new_v4();
        store.save(&quote(user, "Q20261018-03", 0)).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(store.next_quote_number(user, date).unwrap(), "Q20261018-04");
        assert_eq!(store.next_quote_number(Uuid::new_v4(), date).unwrap(), "Q20261018-01");
    }
}
