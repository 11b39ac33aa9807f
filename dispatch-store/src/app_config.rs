use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub carrier: CarrierSettings,
    #[serde(default)]
    pub allocator: AllocatorSettings,
    #[serde(default)]
    pub warehouses: Vec<WarehouseSeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// When false the service runs on in-memory repositories only.
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CarrierSettings {
    /// Ordered base URLs, tried first to last.
    pub endpoints: Vec<String>,
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

/// Carrier-imposed generation limits; overridable for staging accounts
/// with different quotas.
#[derive(Debug, Deserialize, Clone)]
pub struct AllocatorSettings {
    pub max_per_request: u32,
    pub bulk_window_cap: u32,
    pub single_window_cap: u32,
    pub window_secs: u64,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            max_per_request: 10_000,
            bulk_window_cap: 50_000,
            single_window_cap: 750,
            window_secs: 300,
        }
    }
}

/// Pickup locations seeded into the in-memory warehouse registry.
#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseSeed {
    pub name: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Env overrides, e.g. DISPATCH__CARRIER__TOKEN=...
            .add_source(config::Environment::with_prefix("DISPATCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
