//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use crate::config::Config;
use assurscan_core::ports::{
    BillingService, ChatAssistantService, ContractAnalysisService, DatabaseService,
    FileStorageService, TextExtractionService,
};

/// The shared application state, created once at startup and passed to all
/// handlers. Every collaborator sits behind its port trait so tests can swap
/// in mocks and a future OCR service can replace the mock extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub storage: Arc<dyn FileStorageService>,
    pub extractor: Arc<dyn TextExtractionService>,
    pub analysis: Arc<dyn ContractAnalysisService>,
    pub chat: Arc<dyn ChatAssistantService>,
    pub billing: Arc<dyn BillingService>,
}
