pub mod toml_config;

use crate::client::directory::DEFAULT_BASE_URL;
use crate::client::{DEFAULT_CUSTOMER_ID, DEFAULT_PAGE_SIZE};
use crate::core::engine::DEFAULT_CHANNEL_CAPACITY;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_formats, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

pub const ACCESS_TOKEN_ENV: &str = "GWS_ACCESS_TOKEN";
pub const MAX_PAGE_SIZE: u32 = 500;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "gws-source")]
#[command(about = "Sync Google Workspace users into local tables")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub customer_id: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    /// Bearer token; falls back to GWS_ACCESS_TOKEN
    #[arg(long)]
    pub access_token: Option<String>,

    #[arg(long)]
    pub page_size: Option<u32>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long)]
    pub output_path: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub formats: Vec<String>,

    #[arg(long, help = "Bundle output files into one zip archive")]
    pub zip: bool,

    #[arg(long)]
    pub channel_capacity: Option<usize>,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// 合併設定檔、命令列與環境變數後的最終設定
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub customer_id: String,
    pub base_url: String,
    pub access_token: Option<String>,
    pub page_size: u32,
    pub timeout_seconds: Option<u64>,
    pub output_path: String,
    pub formats: Vec<String>,
    pub zip: bool,
    pub channel_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            customer_id: DEFAULT_CUSTOMER_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_seconds: None,
            output_path: "./output".to_string(),
            formats: vec!["csv".to_string()],
            zip: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SyncSettings {
    pub fn from_toml(file: &TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            customer_id: file.source.customer_id.clone().unwrap_or(defaults.customer_id),
            base_url: file.source.base_url.clone().unwrap_or(defaults.base_url),
            access_token: file.source.access_token.clone(),
            page_size: file.source.page_size.unwrap_or(defaults.page_size),
            timeout_seconds: file.source.timeout_seconds,
            output_path: file
                .destination
                .output_path
                .clone()
                .unwrap_or(defaults.output_path),
            formats: file.destination.formats.clone().unwrap_or(defaults.formats),
            zip: file.destination.zip.unwrap_or(defaults.zip),
            channel_capacity: file
                .sync
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
        }
    }

    /// 命令列參數覆蓋設定檔
    #[cfg(feature = "cli")]
    pub fn apply_cli(mut self, cli: &CliConfig) -> Self {
        if let Some(customer_id) = &cli.customer_id {
            self.customer_id = customer_id.clone();
        }
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(token) = &cli.access_token {
            self.access_token = Some(token.clone());
        }
        if let Some(page_size) = cli.page_size {
            self.page_size = page_size;
        }
        if cli.timeout_seconds.is_some() {
            self.timeout_seconds = cli.timeout_seconds;
        }
        if let Some(output_path) = &cli.output_path {
            self.output_path = output_path.clone();
        }
        if !cli.formats.is_empty() {
            self.formats = cli.formats.clone();
        }
        if cli.zip {
            self.zip = true;
        }
        if let Some(capacity) = cli.channel_capacity {
            self.channel_capacity = capacity;
        }
        self
    }

    /// Uses `GWS_ACCESS_TOKEN` when no token was configured.
    pub fn with_env_token(mut self) -> Self {
        let missing = self
            .access_token
            .as_deref()
            .map(|t| t.trim().is_empty() || t.starts_with("${"))
            .unwrap_or(true);
        if missing {
            self.access_token = std::env::var(ACCESS_TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty());
        }
        self
    }
}

impl Validate for SyncSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("customer_id", &self.customer_id)?;
        validate_url("base_url", &self.base_url)?;
        validate_range("page_size", self.page_size, 1, MAX_PAGE_SIZE)?;
        validate_path("output_path", &self.output_path)?;
        validate_formats("formats", &self.formats)?;
        validate_positive_number("channel_capacity", self.channel_capacity, 1)?;
        Ok(())
    }
}

impl ConfigProvider for SyncSettings {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn timeout_seconds(&self) -> Option<u64> {
        self.timeout_seconds
    }

    fn formats(&self) -> &[String] {
        &self.formats
    }

    fn zip_output(&self) -> bool {
        self.zip
    }
}
