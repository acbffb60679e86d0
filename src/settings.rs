use std::fs;
use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use inquire::Text;
use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, Result};

pub const DEFAULT_DATA_ROOT: &str = "~/Documents/Quotes";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub data_root: String,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub billing: BillingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub api_key: Option<String>,
    pub from: String,
    pub api_base: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            from: "QuoteMaker <onboarding@resend.dev>".to_string(),
            api_base: "https://api.resend.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub secret_key: Option<String>,
    pub pro_price_id: Option<String>,
    pub webhook_secret: Option<String>,
    /// Where checkout sends the customer back to.
    pub app_origin: String,
    pub api_base: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            pro_price_id: None,
            webhook_secret: None,
            app_origin: "http://localhost:5173".to_string(),
            api_base: "https://api.stripe.com".to_string(),
        }
    }
}

impl AppSettings {
    pub fn new(data_root: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            email: EmailSettings::default(),
            billing: BillingSettings::default(),
        }
    }

    pub fn data_root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    /// Secrets set in the environment win over the settings file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pick = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = pick("RESEND_API_KEY") {
            self.email.api_key = Some(key);
        }
        if let Some(key) = pick("STRIPE_SECRET_KEY") {
            self.billing.secret_key = Some(key);
        }
        if let Some(price) = pick("STRIPE_PRO_PRICE_ID") {
            self.billing.pro_price_id = Some(price);
        }
        if let Some(secret) = pick("STRIPE_WEBHOOK_SECRET") {
            self.billing.webhook_secret = Some(secret);
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "quote-maker", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn load_settings() -> Result<Option<AppSettings>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let settings = toml::from_str(&content).map_err(|source| QuoteError::Parse { path, source })?;
    Ok(Some(settings))
}

pub fn save_settings(settings: &AppSettings) -> Result<PathBuf> {
    let path = config_path();
    fs::write(&path, toml::to_string_pretty(settings)?)?;
    tracing::debug!(path = %path.display(), "settings saved");
    Ok(path)
}

/// Asks for the data root, keeping any service settings already on disk.
pub fn setup_config_wizard() -> Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings()?;
    let default_val = current
        .as_ref()
        .map(|s| s.data_root.clone())
        .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string());

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Root Data Directory")
        .pick_folder();

    let new_root = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            Text::new("Enter Root Data Directory:")
                .with_default(&default_val)
                .prompt()?
        }
    };

    let settings = match current {
        Some(mut existing) => {
            existing.data_root = new_root;
            existing
        }
        None => AppSettings::new(new_root),
    };

    save_settings(&settings)?;
    println!("✅ Settings saved.");
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
