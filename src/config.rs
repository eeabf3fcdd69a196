//! Configuration types for resume-ingest

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Batch processing configuration (chunking, concurrency, timeouts)
///
/// Groups settings controlling how a batch's files are split into chunks and
/// how items inside a chunk are executed. Used as a nested sub-config within
/// [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcessingConfig {
    /// Number of file ids processed per chunk (default: 5)
    ///
    /// Progress is pushed at chunk granularity, so this also bounds the
    /// update rate: a batch produces at most `ceil(total / chunk_size)`
    /// progress pushes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum simultaneously in-flight items within a chunk (default: 3)
    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,

    /// Hard deadline for downloading and parsing a single file (default: 30s)
    #[serde(default = "default_item_timeout", with = "duration_serde")]
    pub item_timeout: Duration,

    /// Content types accepted for processing
    ///
    /// Files whose resolved MIME type is not in this list are recorded as
    /// failed outcomes, never as errors.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_concurrency: default_chunk_concurrency(),
            item_timeout: default_item_timeout(),
            allowed_types: default_allowed_types(),
        }
    }
}

/// Event stream (SSE) configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StreamConfig {
    /// Per-subscriber message queue capacity (default: 100)
    ///
    /// A subscriber whose queue fills up is dropped rather than letting the
    /// producer block on it.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Idle interval after which a keepalive frame is emitted (default: 60s)
    #[serde(default = "default_keepalive", with = "duration_serde")]
    pub keepalive_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            keepalive_interval: default_keepalive(),
        }
    }
}

/// Cross-process bridge configuration (presence markers, pending buffers)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BridgeConfig {
    /// Time-to-live of the shared presence marker written when a socket
    /// registers (default: 30 minutes)
    #[serde(default = "default_presence_ttl", with = "duration_serde")]
    pub presence_ttl: Duration,

    /// Maximum messages buffered per owner while no connection is known,
    /// replayed in order on the next register (default: 10)
    #[serde(default = "default_pending_limit")]
    pub pending_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            presence_ttl: default_presence_ttl(),
            pending_limit: default_pending_limit(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file (default: "./data/batches.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Notification configuration (terminal-state webhooks)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationConfig {
    /// Webhook configurations
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Events that trigger this webhook
    #[serde(default = "default_webhook_events")]
    pub events: Vec<WebhookEvent>,

    /// Request timeout (default: 10s)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Optional value for the Authorization header
    #[serde(default)]
    pub auth_header: Option<String>,
}

/// Batch events a webhook can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    /// The batch ran to completion (per-file failures included)
    OnCompleted,
    /// The batch run itself failed
    OnFailed,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8095)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Main configuration for the ingestion coordinator
///
/// Fields are organized into logical sub-configs for maintainability:
/// - [`processing`](ProcessingConfig) — chunking, concurrency, timeouts
/// - [`stream`](StreamConfig) — SSE subscriber queues and keepalive
/// - [`bridge`](BridgeConfig) — presence markers and pending buffers
/// - [`persistence`](PersistenceConfig) — database path
/// - [`notifications`](NotificationConfig) — terminal-state webhooks
/// - [`server`](ServerIntegrationConfig) — REST API settings
///
/// Sub-config fields are flattened for serialization where the resulting
/// JSON/TOML stays flat, so the on-disk format has no deep nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Batch processing settings
    #[serde(flatten)]
    pub processing: ProcessingConfig,

    /// Event stream settings
    #[serde(flatten)]
    pub stream: StreamConfig,

    /// Cross-process bridge settings
    #[serde(flatten)]
    pub bridge: BridgeConfig,

    /// Data storage settings
    pub persistence: PersistenceConfig,

    /// Notification settings (webhooks)
    #[serde(flatten)]
    pub notifications: NotificationConfig,

    /// API server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Check the configuration for values that cannot work at runtime
    ///
    /// Returns the first problem found as [`crate::Error::Config`] with the
    /// offending key named.
    pub fn validate(&self) -> crate::Result<()> {
        if self.processing.chunk_size == 0 {
            return Err(crate::Error::Config {
                message: "chunk_size must be at least 1".to_string(),
                key: Some("chunk_size".to_string()),
            });
        }
        if self.processing.chunk_concurrency == 0 {
            return Err(crate::Error::Config {
                message: "chunk_concurrency must be at least 1".to_string(),
                key: Some("chunk_concurrency".to_string()),
            });
        }
        if self.stream.queue_capacity == 0 {
            return Err(crate::Error::Config {
                message: "queue_capacity must be at least 1".to_string(),
                key: Some("queue_capacity".to_string()),
            });
        }
        for webhook in &self.notifications.webhooks {
            if url::Url::parse(&webhook.url).is_err() {
                return Err(crate::Error::Config {
                    message: format!("invalid webhook URL: {}", webhook.url),
                    key: Some("webhooks".to_string()),
                });
            }
        }
        Ok(())
    }

    /// Whether a resolved content type is acceptable for processing
    pub fn is_allowed_type(&self, content_type: &str) -> bool {
        // Parameters like "; charset=utf-8" are not part of the allow-list
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        self.processing
            .allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    }
}

fn default_chunk_size() -> usize {
    5
}

fn default_chunk_concurrency() -> usize {
    3
}

fn default_item_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "application/msword".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string(),
        "text/plain".to_string(),
    ]
}

fn default_queue_capacity() -> usize {
    100
}

fn default_keepalive() -> Duration {
    Duration::from_secs(60)
}

fn default_presence_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_pending_limit() -> usize {
    10
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/batches.db")
}

fn default_webhook_events() -> Vec<WebhookEvent> {
    vec![WebhookEvent::OnCompleted, WebhookEvent::OnFailed]
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:8095"
        .parse()
        .unwrap_or(SocketAddr::from(([127, 0, 0, 1], 8095)))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (seconds as integers)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
