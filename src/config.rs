use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";
pub const DEFAULT_IANA_WHOIS_HOST: &str = "whois.iana.org";
pub const DEFAULT_USER_AGENT: &str = concat!("domain-resolver/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    pub rdap_timeout_seconds: u64,
    pub whois_timeout_seconds: u64,
    pub discovery_timeout_seconds: u64,
    pub whois_port: u16,
    pub max_response_size: usize,
    pub read_buffer_size: usize,
    pub max_referrals: usize,
    pub syntax_retry_delay_ms: u64,
    pub bootstrap_ttl_seconds: u64,
    pub whois_server_ttl_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub user_agent: String,
    pub bootstrap_url: String,
    pub iana_whois_host: String,
    pub rdap_default_servers: Vec<String>,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub port: u16,
    pub environment: Environment,
    pub rdap_timeout_seconds: u64,
    pub whois_timeout_seconds: u64,
    pub discovery_timeout_seconds: u64,
    pub whois_port: u16,
    pub max_response_size: usize,
    pub read_buffer_size: usize,
    pub max_referrals: usize,
    pub syntax_retry_delay_ms: u64,
    pub bootstrap_ttl_seconds: u64,
    pub whois_server_ttl_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub user_agent: String,
    pub bootstrap_url: String,
    pub iana_whois_host: String,
    pub rdap_default_servers: Vec<String>,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            port: 3000,
            environment: Environment::Development,
            rdap_timeout_seconds: 30,
            whois_timeout_seconds: 30,
            discovery_timeout_seconds: 10,
            whois_port: 43,
            max_response_size: 1024 * 1024,
            read_buffer_size: 8192,
            max_referrals: 1,
            syntax_retry_delay_ms: 500,
            bootstrap_ttl_seconds: 3600,
            whois_server_ttl_seconds: 24 * 3600,
            cache_ttl_seconds: 300,
            cache_max_entries: 5000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            iana_whois_host: DEFAULT_IANA_WHOIS_HOST.to_string(),
            rdap_default_servers: vec![
                "https://rdap.verisign.com/com/v1/".to_string(),
                "https://rdap.iana.org/".to_string(),
            ],
        }
    }
}

impl From<ConfigData> for Config {
    fn from(data: ConfigData) -> Self {
        Config {
            port: data.port,
            environment: data.environment,
            rdap_timeout_seconds: data.rdap_timeout_seconds,
            whois_timeout_seconds: data.whois_timeout_seconds,
            discovery_timeout_seconds: data.discovery_timeout_seconds,
            whois_port: data.whois_port,
            max_response_size: data.max_response_size,
            read_buffer_size: data.read_buffer_size.max(512),
            max_referrals: data.max_referrals,
            syntax_retry_delay_ms: data.syntax_retry_delay_ms,
            bootstrap_ttl_seconds: data.bootstrap_ttl_seconds,
            whois_server_ttl_seconds: data.whois_server_ttl_seconds,
            cache_ttl_seconds: data.cache_ttl_seconds,
            cache_max_entries: data.cache_max_entries,
            user_agent: data.user_agent,
            bootstrap_url: data.bootstrap_url,
            iana_whois_host: data.iana_whois_host,
            rdap_default_servers: data.rdap_default_servers,
            start_time: Instant::now(),
        }
    }
}

impl Default for Config {
    /// Built-in defaults, without consulting the environment.
    fn default() -> Self {
        ConfigData::default().into()
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = ConfigData::default();
        let environment = if Self::is_production_environment() {
            "production"
        } else {
            "development"
        };

        let mut settings = config::Config::builder()
            .set_default("port", Self::get_default_port().unwrap_or(defaults.port) as i64)?
            .set_default("environment", environment)?
            .set_default("rdap_timeout_seconds", defaults.rdap_timeout_seconds)?
            .set_default("whois_timeout_seconds", defaults.whois_timeout_seconds)?
            .set_default("discovery_timeout_seconds", defaults.discovery_timeout_seconds)?
            .set_default("whois_port", defaults.whois_port as i64)?
            .set_default("max_response_size", defaults.max_response_size as i64)?
            .set_default("read_buffer_size", defaults.read_buffer_size as i64)?
            .set_default("max_referrals", defaults.max_referrals as i64)?
            .set_default("syntax_retry_delay_ms", defaults.syntax_retry_delay_ms)?
            .set_default("bootstrap_ttl_seconds", defaults.bootstrap_ttl_seconds)?
            .set_default("whois_server_ttl_seconds", defaults.whois_server_ttl_seconds)?
            .set_default("cache_ttl_seconds", defaults.cache_ttl_seconds)?
            .set_default("cache_max_entries", defaults.cache_max_entries)?
            .set_default("user_agent", defaults.user_agent.clone())?
            .set_default("bootstrap_url", defaults.bootstrap_url.clone())?
            .set_default("iana_whois_host", defaults.iana_whois_host.clone())?
            .set_default("rdap_default_servers", defaults.rdap_default_servers.clone())?;

        settings = Self::apply_env_overrides(settings)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;
        Ok(config_data.into())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn rdap_timeout(&self) -> Duration {
        Duration::from_secs(self.rdap_timeout_seconds)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_secs(self.whois_timeout_seconds)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_seconds)
    }

    pub fn bootstrap_ttl(&self) -> Duration {
        Duration::from_secs(self.bootstrap_ttl_seconds)
    }

    pub fn whois_server_ttl(&self) -> Duration {
        Duration::from_secs(self.whois_server_ttl_seconds)
    }

    pub fn syntax_retry_delay(&self) -> Duration {
        Duration::from_millis(self.syntax_retry_delay_ms)
    }

    fn is_production_environment() -> bool {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
            .unwrap_or(false)
    }

    fn get_default_port() -> Option<u16> {
        std::env::var("PORT")
            .or_else(|_| std::env::var("HTTP_PORT"))
            .or_else(|_| std::env::var("SERVER_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
    }

    fn apply_env_overrides(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("RDAP_TIMEOUT_SECONDS", "rdap_timeout_seconds"),
            ("RDAP_TIMEOUT", "rdap_timeout_seconds"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("DISCOVERY_TIMEOUT_SECONDS", "discovery_timeout_seconds"),
            ("DISCOVERY_TIMEOUT", "discovery_timeout_seconds"),
            ("WHOIS_PORT", "whois_port"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
            ("READ_BUFFER_SIZE", "read_buffer_size"),
            ("MAX_REFERRALS", "max_referrals"),
            ("SYNTAX_RETRY_DELAY_MS", "syntax_retry_delay_ms"),
            ("BOOTSTRAP_TTL_SECONDS", "bootstrap_ttl_seconds"),
            ("WHOIS_SERVER_TTL_SECONDS", "whois_server_ttl_seconds"),
            ("CACHE_TTL_SECONDS", "cache_ttl_seconds"),
            ("CACHE_TTL", "cache_ttl_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("CACHE_SIZE", "cache_max_entries"),
            ("USER_AGENT", "user_agent"),
            ("RDAP_BOOTSTRAP_URL", "bootstrap_url"),
            ("IANA_WHOIS_HOST", "iana_whois_host"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        // Comma separated, e.g. "https://rdap.verisign.com/com/v1/,https://rdap.iana.org/"
        if let Ok(value) = std::env::var("RDAP_DEFAULT_SERVERS") {
            let servers: Vec<String> = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            settings = settings.set_override("rdap_default_servers", servers)?;
        }

        Ok(settings)
    }
}
