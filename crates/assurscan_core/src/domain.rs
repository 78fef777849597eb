//! crates/assurscan_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework; serde
//! derives exist because the analysis payload crosses the LLM boundary as
//! JSON and the same shapes are returned to the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Users and Profiles
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// An identity record, upserted on every authenticated `/auth/me` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Subscription tier, determining the per-profile document quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Premium,
    Enterprise,
}

impl SubscriptionPlan {
    /// The number of contract scans the plan allows. `-1` means unlimited.
    pub fn documents_limit(self) -> i32 {
        match self {
            SubscriptionPlan::Free => 3,
            SubscriptionPlan::Premium => 50,
            SubscriptionPlan::Enterprise => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Premium => "premium",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }
}

impl std::str::FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionPlan::Free),
            "premium" => Ok(SubscriptionPlan::Premium),
            "enterprise" => Ok(SubscriptionPlan::Enterprise),
            other => Err(format!("unknown subscription plan '{}'", other)),
        }
    }
}

/// Per-user billing and usage state. Provisioned lazily on first fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub subscription_plan: SubscriptionPlan,
    pub documents_uploaded: i32,
    pub documents_limit: i32,
}

impl Profile {
    /// A fresh free-tier profile for a user seen for the first time.
    pub fn new_free(user_id: Uuid, email: Option<String>, full_name: Option<String>) -> Self {
        Self {
            id: user_id,
            email,
            full_name,
            avatar_url: None,
            subscription_plan: SubscriptionPlan::Free,
            documents_uploaded: 0,
            documents_limit: SubscriptionPlan::Free.documents_limit(),
        }
    }

    /// Whether a new scan submission is allowed under the current quota.
    /// A limit of `-1` is treated as unlimited.
    pub fn can_upload(&self) -> bool {
        self.documents_limit == -1 || self.documents_uploaded < self.documents_limit
    }
}

//=========================================================================================
// Contracts and Analysis
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    #[serde(rename = "actif")]
    Actif,
    #[serde(rename = "resilie")]
    Resilie,
    #[serde(rename = "a_renouveler")]
    ARenouveler,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Actif => "actif",
            ContractStatus::Resilie => "resilie",
            ContractStatus::ARenouveler => "a_renouveler",
        }
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actif" => Ok(ContractStatus::Actif),
            "resilie" => Ok(ContractStatus::Resilie),
            "a_renouveler" => Ok(ContractStatus::ARenouveler),
            other => Err(format!("unknown contract status '{}'", other)),
        }
    }
}

/// The monetary amounts extracted from a contract, all in euros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Amounts {
    #[serde(default)]
    pub prime_mensuelle: Option<f64>,
    #[serde(default)]
    pub franchise: Option<f64>,
    #[serde(default)]
    pub plafond_garantie: Option<f64>,
}

/// A missing or insufficient coverage identified by the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub title: String,
    pub description: String,
    pub impact: String,
    pub solution: String,
}

/// An actionable optimization suggestion with an estimated yearly saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub savings: f64,
    pub priority: String,
}

/// The structured record produced by the analysis LLM for one contract.
///
/// Deserialized straight from the model's JSON reply; the serde derive is the
/// schema enforcement at the boundary. Collection fields default to empty so
/// a sparse but otherwise valid reply still parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub contract_type: String,
    #[serde(default)]
    pub main_coverages: Vec<String>,
    #[serde(default)]
    pub amounts: Amounts,
    #[serde(default)]
    pub exclusions: Vec<String>,
    pub optimization_score: i32,
    pub potential_savings: f64,
    #[serde(default)]
    pub coverage_gaps: Vec<CoverageGap>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

/// One uploaded document's derived record. Created once by the scan
/// workflow and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub contract_type: String,
    pub status: ContractStatus,
    pub extracted_text: String,
    pub main_coverages: Vec<String>,
    pub amounts: Amounts,
    pub exclusions: Vec<String>,
    pub optimization_score: i32,
    pub potential_savings: f64,
    pub coverage_gaps: Vec<CoverageGap>,
    pub recommendations: Vec<Recommendation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Builds the condensed view of a contract that is embedded in the chat
    /// assistant's system prompt.
    pub fn summary(&self) -> ContractSummary {
        ContractSummary {
            contract_type: self.contract_type.clone(),
            main_coverages: self.main_coverages.clone(),
            amounts: self.amounts.clone(),
            exclusions: self.exclusions.clone(),
            optimization_score: self.optimization_score,
            potential_savings: self.potential_savings,
            coverage_gap_count: self.coverage_gaps.len(),
        }
    }
}

/// The contract context handed to the chat assistant.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSummary {
    pub contract_type: String,
    pub main_coverages: Vec<String>,
    pub amounts: Amounts,
    pub exclusions: Vec<String>,
    pub optimization_score: i32,
    pub potential_savings: f64,
    pub coverage_gap_count: usize,
}

/// Aggregate figures across all of a user's contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_contracts: i64,
    pub total_savings: f64,
    pub avg_score: i32,
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A persisted chat message. Append-only, always produced in user/assistant
/// pairs by the chat workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contract_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One prior exchange turn, as sent to the chat LLM.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

//=========================================================================================
// External Collaborator Results
//=========================================================================================

/// The outcome of storing a raw file in the object store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredFile {
    pub key: String,
    pub url: String,
}

/// The parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub price_id: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A hosted checkout session created by the billing provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}
