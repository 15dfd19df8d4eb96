use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Prefix shared by every environment variable the service reads
pub const ENV_PREFIX: &str = "STOREFRONT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub cart: CartConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_products_table")]
    pub products_table_name: String,
    #[serde(default = "default_cart_items_table")]
    pub cart_items_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint override for the document store, e.g. a local DynamoDB
    #[serde(default)]
    pub database_uri: Option<String>,
    #[serde(default = "default_true")]
    pub bootstrap_tables: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_token")]
    pub token: String,
    /// SSM parameter holding the token; overrides `token` when readable
    #[serde(default)]
    pub token_parameter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartConfig {
    #[serde(default)]
    pub refresh_last_modified_on_edit: bool,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub ssm_client: SsmClient,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_size", &"<runtime>")
            .finish()
    }
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let mut auth = AuthConfig::from_env()?;
        let api = ApiConfig::from_env()?;
        let cart = CartConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()))
            .load()
            .await;

        let mut dynamodb_config = aws_sdk_dynamodb::config::Builder::from(&aws_config);
        if let Some(uri) = &database.database_uri {
            info!("Using document store endpoint {}", uri);
            dynamodb_config = dynamodb_config.endpoint_url(uri);
        }
        let dynamodb_client = DynamoDbClient::from_conf(dynamodb_config.build());
        let ssm_client = SsmClient::new(&aws_config);

        let parameter_store = Arc::new(ParameterStoreConfig::new(
            ssm_client.clone(),
            Duration::from_secs(5 * 60),
        ));

        if let Some(name) = &auth.token_parameter {
            auth.token = parameter_store
                .get_parameter_with_default(name, &auth.token)
                .await;
        }

        let aws = AwsConfig {
            region: database.region.clone(),
            dynamodb_client,
            ssm_client,
            parameter_store,
        };

        let config = Config {
            server,
            database,
            auth,
            api,
            cart,
            aws,
            observability,
        };

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!(
            server = ?config.server,
            database = ?config.database,
            api = ?config.api,
            cart = ?config.cart,
            "Configuration"
        );

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        info!("Validating configuration");

        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate()?;
        self.api.validate()?;

        if self.observability.otlp_endpoint.is_none() {
            warn!("No OTLP endpoint configured, traces will not be exported");
        }

        info!("Configuration validation completed");
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError {
        message: message.to_string(),
    }
}

/// Deserialize one section from `STOREFRONT_<SECTION>_*` variables.
///
/// `fallbacks` maps keys to unprefixed variables consulted when the prefixed
/// one is absent.
fn load_section<T: DeserializeOwned>(
    section: &str,
    fallbacks: &[(&str, &str)],
) -> Result<T, ConfigError> {
    let mut builder = config::Config::builder();

    for (key, variable) in fallbacks {
        if let Ok(value) = std::env::var(variable) {
            builder = builder
                .set_default(*key, value)
                .map_err(|e| ConfigError::LoadError {
                    message: format!("Failed to apply {} fallback: {}", variable, e),
                })?;
        }
    }

    let settings = builder
        .add_source(config::Environment::with_prefix(&format!(
            "{}_{}",
            ENV_PREFIX, section
        )))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section.to_lowercase(), e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!(
                "Failed to deserialize {} config: {}",
                section.to_lowercase(),
                e
            ),
        })
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("SERVER", &[("port", "PORT")])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(invalid("Request timeout cannot be 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("DATABASE", &[("database_uri", "DATABASE_URI")])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.products_table_name.is_empty() {
            return Err(invalid("Products table name cannot be empty"));
        }
        if self.cart_items_table_name.is_empty() {
            return Err(invalid("Cart items table name cannot be empty"));
        }
        Ok(())
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("AUTH", &[])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(invalid("Auth token cannot be empty"));
        }
        Ok(())
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("API", &[])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_path.starts_with('/') || self.base_path.len() < 2 {
            return Err(invalid("API base path must start with '/' and name a segment"));
        }
        Ok(())
    }
}

impl CartConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("CART", &[])
    }
}

impl ObservabilityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("OBSERVABILITY", &[])
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        debug!("Getting parameter: {}", name);

        {
            let cache = self.cache.read().await;
            if let Some((value, timestamp)) = cache.get(name) {
                if timestamp.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
                debug!("Parameter cache expired: {}", name);
            }
        }

        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        {
            let mut cache = self.cache.write().await;
            cache.insert(name.to_string(), (value.clone(), Instant::now()));
        }

        debug!("Parameter retrieved and cached: {}", name);
        Ok(value)
    }

    pub async fn get_parameter_with_default(&self, name: &str, default: &str) -> String {
        match self.get_parameter(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to get parameter {}, using default: {}", name, e);
                default.to_string()
            }
        }
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
        info!("Parameter store cache cleared");
    }

    pub async fn cache_size(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    3000
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024 // 1MB
}

pub(crate) fn default_products_table() -> String {
    "products".to_string()
}

pub(crate) fn default_cart_items_table() -> String {
    "cart_items".to_string()
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_auth_token() -> String {
    crate::auth::DEFAULT_AUTH_TOKEN.to_string()
}

pub(crate) fn default_base_path() -> String {
    "/api/v1".to_string()
}

pub(crate) fn default_service_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
