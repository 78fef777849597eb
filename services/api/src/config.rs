//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development. Credentials for optional
//! collaborators (LLM endpoint, object store, billing provider) are kept as
//! `Option`s so the service can boot without them; the corresponding adapter
//! reports a missing-configuration error when first used.

use std::net::SocketAddr;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub app_url: String,
    /// User id promoted to the admin role on sign-in.
    pub owner_id: Option<Uuid>,
    // LLM endpoint (OpenRouter or any OpenAI-compatible server)
    pub openrouter_api_key: Option<String>,
    pub openrouter_api_base: String,
    pub analysis_model: String,
    pub chat_model: String,
    // Object store
    pub storage_endpoint: Option<String>,
    pub storage_token: Option<String>,
    // Billing provider
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub stripe_premium_price_id: Option<String>,
    pub stripe_enterprise_price_id: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let owner_id = match std::env::var("OWNER_ID") {
            Ok(raw) => Some(raw.parse::<Uuid>().map_err(|e| {
                ConfigError::InvalidValue("OWNER_ID".to_string(), e.to_string())
            })?),
            Err(_) => None,
        };

        // --- Load LLM Settings (key is optional) ---
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY").ok();
        let openrouter_api_base = std::env::var("OPENROUTER_API_BASE")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
        let analysis_model =
            std::env::var("ANALYSIS_MODEL").unwrap_or_else(|_| "openai/gpt-4o".to_string());
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "openai/gpt-4o".to_string());

        // --- Load Object Store Settings ---
        let storage_endpoint = std::env::var("STORAGE_ENDPOINT").ok();
        let storage_token = std::env::var("STORAGE_TOKEN").ok();

        // --- Load Billing Settings ---
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").ok();
        let stripe_api_base = std::env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let stripe_premium_price_id = std::env::var("STRIPE_PREMIUM_PRICE_ID").ok();
        let stripe_enterprise_price_id = std::env::var("STRIPE_ENTERPRISE_PRICE_ID").ok();

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            app_url,
            owner_id,
            openrouter_api_key,
            openrouter_api_base,
            analysis_model,
            chat_model,
            storage_endpoint,
            storage_token,
            stripe_secret_key,
            stripe_api_base,
            stripe_premium_price_id,
            stripe_enterprise_price_id,
        })
    }

    /// Maps a plan name to its configured billing price id.
    pub fn price_id_for_plan(&self, plan: assurscan_core::SubscriptionPlan) -> Option<&str> {
        match plan {
            assurscan_core::SubscriptionPlan::Premium => self.stripe_premium_price_id.as_deref(),
            assurscan_core::SubscriptionPlan::Enterprise => {
                self.stripe_enterprise_price_id.as_deref()
            }
            assurscan_core::SubscriptionPlan::Free => None,
        }
    }
}
