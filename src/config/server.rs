//! Server and networking configuration types.

use serde::Deserialize;

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the JSON API.
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the identity service; `GET {base_url}/user` resolves a token.
    pub base_url: String,
    /// Project API key sent alongside the bearer token.
    pub api_key: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9999/auth/v1".to_string(),
            api_key: String::new(),
            timeout_ms: 5_000,
        }
    }
}

/// Payment gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    /// Shared secret for payment signatures and API basic auth.
    pub key_secret: String,
    /// Shared secret for webhook body signatures.
    pub webhook_secret: String,
    /// ISO currency code for new orders.
    pub currency: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.razorpay.com/v1".to_string(),
            key_id: String::new(),
            key_secret: String::new(),
            webhook_secret: String::new(),
            currency: "INR".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// One-time code configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Code lifetime in seconds.
    pub ttl_secs: i64,
    /// Wrong guesses allowed per code. Reissuing keeps the count.
    pub max_attempts: u32,
    /// Minimum seconds between two codes for one subject.
    pub resend_after_secs: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_attempts: 5,
            resend_after_secs: 30,
        }
    }
}
