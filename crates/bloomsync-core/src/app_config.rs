use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// One Shopify store the manual sync endpoint may pull from.
///
/// Credential resolution is owned by the backoffice OAuth flow; this service
/// only receives already-resolved handles at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub tenant_id: String,
    pub store_id: String,
    pub base_url: String,
    pub access_token: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("tenant_id", &self.tenant_id)
            .field("store_id", &self.store_id)
            .field("base_url", &self.base_url)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub shopify_request_timeout_secs: u64,
    pub shopify_user_agent: String,
    pub shopify_max_retries: u32,
    pub shopify_retry_backoff_base_secs: u64,
    pub shopify_inter_request_delay_ms: u64,
    pub shopify_stores: Vec<StoreConfig>,
    pub realtime_channel_capacity: usize,
    pub realtime_heartbeat_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "shopify_request_timeout_secs",
                &self.shopify_request_timeout_secs,
            )
            .field("shopify_user_agent", &self.shopify_user_agent)
            .field("shopify_max_retries", &self.shopify_max_retries)
            .field(
                "shopify_retry_backoff_base_secs",
                &self.shopify_retry_backoff_base_secs,
            )
            .field(
                "shopify_inter_request_delay_ms",
                &self.shopify_inter_request_delay_ms,
            )
            .field("shopify_stores", &self.shopify_stores)
            .field("realtime_channel_capacity", &self.realtime_channel_capacity)
            .field("realtime_heartbeat_secs", &self.realtime_heartbeat_secs)
            .finish()
    }
}
