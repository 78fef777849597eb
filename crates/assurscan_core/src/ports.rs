//! crates/assurscan_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! database, the object store, the LLM endpoint, or the billing provider.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AnalysisResult, ChatMessage, ChatTurn, CheckoutParams, CheckoutSession, Contract,
    ContractSummary, Profile, StoredFile, User, UserStats,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database,
/// object store, LLM endpoint, billing provider).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Optional filters for listing a user's contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub contract_type: Option<String>,
    pub status: Option<String>,
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn upsert_user(&self, user: &User) -> PortResult<()>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    // --- Profile / Usage Ledger ---
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    async fn upsert_profile(&self, profile: &Profile) -> PortResult<()>;

    /// Atomically adds 1 to the profile's `documents_uploaded` counter.
    async fn increment_documents_uploaded(&self, user_id: Uuid) -> PortResult<()>;

    /// Atomically subtracts 1 from the counter, floored at 0.
    async fn decrement_documents_uploaded(&self, user_id: Uuid) -> PortResult<()>;

    // --- Contract Management ---
    async fn create_contract(&self, contract: &Contract) -> PortResult<()>;

    async fn get_contract(&self, contract_id: Uuid) -> PortResult<Option<Contract>>;

    async fn list_contracts(
        &self,
        user_id: Uuid,
        filter: &ContractFilter,
    ) -> PortResult<Vec<Contract>>;

    /// Deletes a contract only when it exists and belongs to `user_id`.
    /// Returns whether a row was actually removed.
    async fn delete_contract(&self, contract_id: Uuid, user_id: Uuid) -> PortResult<bool>;

    async fn user_stats(&self, user_id: Uuid) -> PortResult<UserStats>;

    // --- Chat Messages ---
    async fn create_chat_message(&self, message: &ChatMessage) -> PortResult<()>;

    /// Returns up to `limit` messages for the contract in chronological order.
    async fn chat_history(&self, contract_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>>;
}

#[async_trait]
pub trait FileStorageService: Send + Sync {
    /// Persists raw file bytes under `key`, returning the public URL.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> PortResult<StoredFile>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Produces the textual content of an uploaded document.
    async fn extract_text(&self, file_bytes: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait ContractAnalysisService: Send + Sync {
    /// Produces the structured analysis of a contract's extracted text.
    /// A single attempt per call; no retry on upstream failure.
    async fn analyze(&self, extracted_text: &str) -> PortResult<AnalysisResult>;
}

#[async_trait]
pub trait ChatAssistantService: Send + Sync {
    /// Answers a user message scoped to one analyzed contract, given the
    /// prior conversation turns in chronological order.
    async fn reply(
        &self,
        user_message: &str,
        contract: &ContractSummary,
        history: &[ChatTurn],
    ) -> PortResult<String>;
}

#[async_trait]
pub trait BillingService: Send + Sync {
    /// Creates a hosted checkout session for a subscription upgrade.
    async fn create_checkout_session(&self, params: &CheckoutParams)
        -> PortResult<CheckoutSession>;
}
