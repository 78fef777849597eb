pub mod domain;
pub mod ports;

pub use domain::{
    Amounts, AnalysisResult, ChatMessage, ChatRole, ChatTurn, CheckoutParams, CheckoutSession,
    Contract, ContractStatus, ContractSummary, CoverageGap, Profile, Recommendation, StoredFile,
    SubscriptionPlan, User, UserRole, UserStats,
};
pub use ports::{
    BillingService, ChatAssistantService, ContractAnalysisService, ContractFilter,
    DatabaseService, FileStorageService, PortError, PortResult, TextExtractionService,
};
