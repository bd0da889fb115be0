//! `config.toml` under the vault home, with environment overrides.

use crate::factory::Backend;
use anyhow::Context as _;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    /// Model used for grounded metadata searches.
    pub search_model: String,
    /// Model used for description rewrites.
    pub text_model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            search_model: "gemini-3-pro-preview".to_string(),
            text_model: "gemini-3-flash-preview".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VaultConfig {
    /// Where slots are stored. Defaults to the vault home.
    pub data_dir: Option<PathBuf>,
    /// `file` or `sqlite`.
    pub backend: String,
    pub enrich_delay_ms: u64,
    pub gemini: GeminiConfig,
    #[serde(skip)]
    home: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: "file".to_string(),
            enrich_delay_ms: 1200,
            gemini: GeminiConfig::default(),
            home: PathBuf::new(),
        }
    }
}

impl VaultConfig {
    /// `$GEAR_VAULT_HOME`, else `~/.gear-vault`.
    pub fn home_dir() -> anyhow::Result<PathBuf> {
        if let Ok(home) = std::env::var("GEAR_VAULT_HOME")
            && !home.is_empty()
        {
            return Ok(PathBuf::from(home));
        }
        let Some(user_home) = dirs::home_dir() else {
            anyhow::bail!("cannot determine home directory; set GEAR_VAULT_HOME");
        };
        Ok(user_home.join(".gear-vault"))
    }

    /// Load from the default home and apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let home = Self::home_dir()?;
        Ok(Self::load_from(&home)?.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Read `<home>/config.toml`. A missing file gives the defaults.
    pub fn load_from(home: &Path) -> anyhow::Result<Self> {
        let path = home.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str::<VaultConfig>(&s)
                .with_context(|| format!("parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VaultConfig::default(),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        config.home = home.to_path_buf();
        Ok(config)
    }

    /// Apply `GEAR_VAULT_*` overrides looked up through `var`.
    pub fn with_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = var("GEAR_VAULT_BACKEND").filter(|s| !s.is_empty()) {
            self.backend = backend;
        }
        if let Some(dir) = var("GEAR_VAULT_DATA_DIR").filter(|s| !s.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = var("GEAR_VAULT_ENRICH_DELAY_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => self.enrich_delay_ms = ms,
                Err(_) => tracing::warn!(value = %ms, "ignoring invalid GEAR_VAULT_ENRICH_DELAY_MS"),
            }
        }
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| self.home.clone())
    }

    pub fn backend(&self) -> Backend {
        Backend::from_name(&self.backend)
    }

    pub fn enrich_delay(&self) -> Duration {
        Duration::from_millis(self.enrich_delay_ms)
    }
}
