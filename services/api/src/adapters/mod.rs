pub mod analysis_llm;
pub mod billing;
pub mod chat_llm;
pub mod db;
pub mod extraction;
pub mod storage;

pub use analysis_llm::OpenRouterAnalysisAdapter;
pub use billing::StripeBillingAdapter;
pub use chat_llm::OpenRouterChatAdapter;
pub use db::DbAdapter;
pub use extraction::MockOcrAdapter;
pub use storage::HttpStorageAdapter;
