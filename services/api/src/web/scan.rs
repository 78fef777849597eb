//! services/api/src/web/scan.rs
//!
//! The contract scan workflow: quota check, file upload, text extraction,
//! AI analysis, persistence, and usage accounting. This is the one
//! multi-step path in the service, so each step has an explicit error
//! classification and the ordering rules are tested against mock ports.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::web::{middleware::AuthUser, state::AppState};
use assurscan_core::domain::{AnalysisResult, Contract, ContractStatus};
use assurscan_core::ports::PortError;

/// The errors a scan submission can surface, one per workflow step.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Document limit reached ({used}/{limit}). Please upgrade to Premium.")]
    QuotaExceeded { used: i32, limit: i32 },
    #[error("Profile not found")]
    ProfileNotFound,
    #[error("Upload failed: {0}")]
    Upload(PortError),
    #[error("Extraction failed: {0}")]
    Extraction(String),
    #[error("Analysis failed: {0}")]
    Analysis(PortError),
    #[error("Persistence failed: {0}")]
    Persistence(PortError),
}

/// The result of a successful scan: the persisted contract plus the raw
/// analysis payload it was derived from.
#[derive(Debug)]
pub struct ScanOutcome {
    pub contract: Contract,
    pub analysis: AnalysisResult,
}

/// Submits one document for analysis.
///
/// Ordering matters: the quota is checked before any side effect, the upload
/// happens before extraction and analysis, and the usage counter is bumped
/// only after the contract row exists. There is no cross-step transaction;
/// a failure mid-way leaves earlier side effects in place (an uploaded file
/// with no contract row is accepted).
pub async fn submit_scan(
    state: &AppState,
    user: &AuthUser,
    file_name: &str,
    file_bytes: &[u8],
) -> Result<ScanOutcome, ScanError> {
    // 1. Quota gate. Nothing may be uploaded or analyzed on rejection.
    let profile = state
        .db
        .get_profile(user.id)
        .await
        .map_err(ScanError::Persistence)?
        .ok_or(ScanError::ProfileNotFound)?;

    if !profile.can_upload() {
        info!(
            user_id = %user.id,
            used = profile.documents_uploaded,
            limit = profile.documents_limit,
            "Scan rejected: document quota reached"
        );
        return Err(ScanError::QuotaExceeded {
            used: profile.documents_uploaded,
            limit: profile.documents_limit,
        });
    }

    // 2. Persist the raw file under a collision-resistant key.
    let key = format!("contracts/{}-{}", Utc::now().timestamp_millis(), file_name);
    let stored = state
        .storage
        .put(&key, file_bytes, "application/pdf")
        .await
        .map_err(ScanError::Upload)?;

    // 3. Extract the document's text.
    let extracted_text = state
        .extractor
        .extract_text(file_bytes)
        .await
        .map_err(|e| ScanError::Extraction(e.to_string()))?;
    if extracted_text.trim().is_empty() {
        return Err(ScanError::Extraction(
            "Extraction produced no text".to_string(),
        ));
    }

    // 4. Ask the LLM for the structured analysis. Single attempt, no retry.
    let analysis = state
        .analysis
        .analyze(&extracted_text)
        .await
        .map_err(ScanError::Analysis)?;

    // 5. Persist the contract record.
    let now = Utc::now();
    let contract = Contract {
        id: Uuid::new_v4(),
        user_id: user.id,
        file_name: file_name.to_string(),
        file_url: stored.url,
        contract_type: analysis.contract_type.clone(),
        status: ContractStatus::Actif,
        extracted_text,
        main_coverages: analysis.main_coverages.clone(),
        amounts: analysis.amounts.clone(),
        exclusions: analysis.exclusions.clone(),
        optimization_score: analysis.optimization_score,
        potential_savings: analysis.potential_savings,
        coverage_gaps: analysis.coverage_gaps.clone(),
        recommendations: analysis.recommendations.clone(),
        created_at: now,
        updated_at: now,
    };
    state
        .db
        .create_contract(&contract)
        .await
        .map_err(ScanError::Persistence)?;

    // 6. Bump the usage counter. Best effort: the contract row already
    //    exists, so a failure here only under-counts usage.
    if let Err(e) = state.db.increment_documents_uploaded(user.id).await {
        warn!(user_id = %user.id, error = %e, "Failed to increment document counter");
    }

    info!(
        user_id = %user.id,
        contract_id = %contract.id,
        score = analysis.optimization_score,
        "Contract scanned and persisted"
    );

    Ok(ScanOutcome { contract, analysis })
}

/// Deletes a user's contract, decrementing the usage counter only when a row
/// was actually removed. A missing or foreign contract is a no-op reporting
/// `false`, leaving the counter untouched.
pub async fn delete_scan(
    state: &AppState,
    user: &AuthUser,
    contract_id: Uuid,
) -> Result<bool, PortError> {
    let deleted = state.db.delete_contract(contract_id, user.id).await?;
    if deleted {
        state.db.decrement_documents_uploaded(user.id).await?;
        info!(user_id = %user.id, contract_id = %contract_id, "Contract deleted");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockOcrAdapter, OpenRouterChatAdapter, StripeBillingAdapter};
    use crate::config::Config;
    use assurscan_core::domain::{Amounts, ChatMessage, CoverageGap, Profile, StoredFile, User, UserStats};
    use assurscan_core::ports::{
        ContractAnalysisService, ContractFilter, DatabaseService, FileStorageService, PortResult,
        TextExtractionService,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    //=====================================================================================
    // Mock Ports
    //=====================================================================================

    #[derive(Default)]
    struct MockDbState {
        profiles: HashMap<Uuid, Profile>,
        contracts: HashMap<Uuid, Contract>,
    }

    #[derive(Default)]
    struct MockDb {
        state: Mutex<MockDbState>,
    }

    impl MockDb {
        fn with_profile(profile: Profile) -> Self {
            let db = Self::default();
            db.state
                .lock()
                .unwrap()
                .profiles
                .insert(profile.id, profile);
            db
        }

        fn profile(&self, user_id: Uuid) -> Profile {
            self.state.lock().unwrap().profiles[&user_id].clone()
        }
    }

    #[async_trait]
    impl DatabaseService for MockDb {
        async fn upsert_user(&self, _user: &User) -> PortResult<()> {
            Ok(())
        }

        async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
            Err(PortError::NotFound(user_id.to_string()))
        }

        async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
            Ok(self.state.lock().unwrap().profiles.get(&user_id).cloned())
        }

        async fn upsert_profile(&self, profile: &Profile) -> PortResult<()> {
            self.state
                .lock()
                .unwrap()
                .profiles
                .insert(profile.id, profile.clone());
            Ok(())
        }

        async fn increment_documents_uploaded(&self, user_id: Uuid) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(profile) = state.profiles.get_mut(&user_id) {
                profile.documents_uploaded += 1;
            }
            Ok(())
        }

        async fn decrement_documents_uploaded(&self, user_id: Uuid) -> PortResult<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(profile) = state.profiles.get_mut(&user_id) {
                profile.documents_uploaded = (profile.documents_uploaded - 1).max(0);
            }
            Ok(())
        }

        async fn create_contract(&self, contract: &Contract) -> PortResult<()> {
            self.state
                .lock()
                .unwrap()
                .contracts
                .insert(contract.id, contract.clone());
            Ok(())
        }

        async fn get_contract(&self, contract_id: Uuid) -> PortResult<Option<Contract>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .contracts
                .get(&contract_id)
                .cloned())
        }

        async fn list_contracts(
            &self,
            user_id: Uuid,
            _filter: &ContractFilter,
        ) -> PortResult<Vec<Contract>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .contracts
                .values()
                .filter(|c| c.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn delete_contract(&self, contract_id: Uuid, user_id: Uuid) -> PortResult<bool> {
            let mut state = self.state.lock().unwrap();
            let owned = state
                .contracts
                .get(&contract_id)
                .is_some_and(|c| c.user_id == user_id);
            if owned {
                state.contracts.remove(&contract_id);
            }
            Ok(owned)
        }

        async fn user_stats(&self, _user_id: Uuid) -> PortResult<UserStats> {
            Ok(UserStats {
                total_contracts: 0,
                total_savings: 0.0,
                avg_score: 0,
            })
        }

        async fn create_chat_message(&self, _message: &ChatMessage) -> PortResult<()> {
            Ok(())
        }

        async fn chat_history(
            &self,
            _contract_id: Uuid,
            _limit: i64,
        ) -> PortResult<Vec<ChatMessage>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MockStorage {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FileStorageService for MockStorage {
        async fn put(
            &self,
            key: &str,
            _bytes: &[u8],
            _content_type: &str,
        ) -> PortResult<StoredFile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PortError::Upstream {
                    status: 503,
                    message: "store unavailable".to_string(),
                });
            }
            Ok(StoredFile {
                key: key.to_string(),
                url: format!("https://files.example/{}", key),
            })
        }
    }

    struct MockAnalysis {
        calls: AtomicUsize,
        result: Result<AnalysisResult, u16>,
    }

    impl MockAnalysis {
        fn succeeding(result: AnalysisResult) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(result),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(status),
            }
        }
    }

    #[async_trait]
    impl ContractAnalysisService for MockAnalysis {
        async fn analyze(&self, _extracted_text: &str) -> PortResult<AnalysisResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(result) => Ok(result.clone()),
                Err(status) => Err(PortError::Upstream {
                    status: *status,
                    message: "model error".to_string(),
                }),
            }
        }
    }

    struct EmptyExtractor;

    #[async_trait]
    impl TextExtractionService for EmptyExtractor {
        async fn extract_text(&self, _file_bytes: &[u8]) -> PortResult<String> {
            Ok("   ".to_string())
        }
    }

    //=====================================================================================
    // Test Harness
    //=====================================================================================

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: Level::INFO,
            app_url: "http://localhost:3000".to_string(),
            owner_id: None,
            openrouter_api_key: None,
            openrouter_api_base: "https://openrouter.ai/api/v1".to_string(),
            analysis_model: "openai/gpt-4o".to_string(),
            chat_model: "openai/gpt-4o".to_string(),
            storage_endpoint: None,
            storage_token: None,
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            stripe_premium_price_id: None,
            stripe_enterprise_price_id: None,
        }
    }

    fn analysis_result() -> AnalysisResult {
        AnalysisResult {
            contract_type: "auto".to_string(),
            main_coverages: vec!["Responsabilité civile".to_string()],
            amounts: Amounts {
                prime_mensuelle: Some(45.0),
                franchise: Some(350.0),
                plafond_garantie: Some(50_000.0),
            },
            exclusions: vec!["Usage professionnel".to_string()],
            optimization_score: 72,
            potential_savings: 240.0,
            coverage_gaps: vec![
                CoverageGap {
                    title: "Bris de glace".to_string(),
                    description: "Non couvert".to_string(),
                    impact: "300€ par sinistre".to_string(),
                    solution: "Ajouter l'option".to_string(),
                },
                CoverageGap {
                    title: "Assistance 0 km".to_string(),
                    description: "Non incluse".to_string(),
                    impact: "Remorquage à charge".to_string(),
                    solution: "Option assistance".to_string(),
                },
            ],
            recommendations: Vec::new(),
        }
    }

    struct Harness {
        state: AppState,
        db: Arc<MockDb>,
        storage: Arc<MockStorage>,
        analysis: Arc<MockAnalysis>,
        user: AuthUser,
    }

    fn harness(profile: Profile, analysis: MockAnalysis) -> Harness {
        harness_with(profile, MockStorage::default(), analysis)
    }

    fn harness_with(profile: Profile, storage: MockStorage, analysis: MockAnalysis) -> Harness {
        let user = AuthUser {
            id: profile.id,
            email: Some("jean@example.com".to_string()),
            name: Some("Jean Dupont".to_string()),
        };
        let db = Arc::new(MockDb::with_profile(profile));
        let storage = Arc::new(storage);
        let analysis = Arc::new(analysis);
        let state = AppState {
            db: db.clone(),
            config: Arc::new(test_config()),
            storage: storage.clone(),
            extractor: Arc::new(MockOcrAdapter::new()),
            analysis: analysis.clone(),
            chat: Arc::new(OpenRouterChatAdapter::new(None, "m".to_string())),
            billing: Arc::new(StripeBillingAdapter::new(
                reqwest::Client::new(),
                "https://api.stripe.com".to_string(),
                None,
            )),
        };
        Harness {
            state,
            db,
            storage,
            analysis,
            user,
        }
    }

    fn profile_with_usage(used: i32, limit: i32) -> Profile {
        let mut profile = Profile::new_free(Uuid::new_v4(), None, None);
        profile.documents_uploaded = used;
        profile.documents_limit = limit;
        profile
    }

    //=====================================================================================
    // Workflow Tests
    //=====================================================================================

    #[tokio::test]
    async fn successful_scan_persists_contract_and_increments_counter() {
        let h = harness(
            profile_with_usage(2, 3),
            MockAnalysis::succeeding(analysis_result()),
        );

        let outcome = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap();

        assert_eq!(outcome.contract.contract_type, "auto");
        assert_eq!(outcome.contract.optimization_score, 72);
        assert!(outcome.contract.file_url.starts_with("https://files.example/contracts/"));
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 3);
    }

    #[tokio::test]
    async fn quota_rejection_has_no_side_effects() {
        let h = harness(
            profile_with_usage(3, 3),
            MockAnalysis::succeeding(analysis_result()),
        );

        let err = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScanError::QuotaExceeded { used: 3, limit: 3 }
        ));
        assert_eq!(h.storage.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.analysis.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 3);
    }

    #[tokio::test]
    async fn negative_limit_is_unlimited() {
        let h = harness(
            profile_with_usage(1000, -1),
            MockAnalysis::succeeding(analysis_result()),
        );

        let outcome = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF").await;
        assert!(outcome.is_ok());
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 1001);
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_analysis() {
        let h = harness_with(
            profile_with_usage(0, 3),
            MockStorage {
                calls: AtomicUsize::new(0),
                fail: true,
            },
            MockAnalysis::succeeding(analysis_result()),
        );

        let err = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Upload(_)));
        assert_eq!(h.analysis.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 0);
    }

    #[tokio::test]
    async fn analysis_failure_carries_the_upstream_status() {
        let h = harness(profile_with_usage(0, 3), MockAnalysis::failing(500));

        let err = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap_err();

        match err {
            ScanError::Analysis(PortError::Upstream { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected analysis error, got {:?}", other),
        }
        // No contract was persisted and no usage accounted.
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 0);
    }

    #[tokio::test]
    async fn empty_extraction_is_an_extraction_error() {
        let mut h = harness(
            profile_with_usage(0, 3),
            MockAnalysis::succeeding(analysis_result()),
        );
        h.state.extractor = Arc::new(EmptyExtractor);

        let err = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Extraction(_)));
        assert_eq!(h.analysis.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn persisted_contract_round_trips_analysis_fields() {
        let h = harness(
            profile_with_usage(0, 3),
            MockAnalysis::succeeding(analysis_result()),
        );

        let outcome = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap();

        let fetched = h
            .db
            .get_contract(outcome.contract.id)
            .await
            .unwrap()
            .expect("contract must be retrievable after the scan");
        assert_eq!(fetched.optimization_score, 72);
        assert_eq!(fetched.potential_savings, 240.0);
        assert_eq!(fetched.coverage_gaps.len(), 2);
        assert_eq!(fetched.coverage_gaps, outcome.contract.coverage_gaps);
    }

    #[tokio::test]
    async fn second_scan_over_quota_is_rejected_end_to_end() {
        let h = harness(
            profile_with_usage(2, 3),
            MockAnalysis::succeeding(analysis_result()),
        );

        // First submission: 2/3 -> passes, counter becomes 3.
        submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 3);

        // Second submission: 3/3 -> rejected.
        let err = submit_scan(&h.state, &h.user, "contrat2.pdf", b"%PDF")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::QuotaExceeded { .. }));
    }

    //=====================================================================================
    // Deletion Tests
    //=====================================================================================

    #[tokio::test]
    async fn delete_of_owned_contract_decrements_counter() {
        let h = harness(
            profile_with_usage(0, 3),
            MockAnalysis::succeeding(analysis_result()),
        );
        let outcome = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 1);

        let deleted = delete_scan(&h.state, &h.user, outcome.contract.id)
            .await
            .unwrap();
        assert!(deleted);
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 0);
    }

    #[tokio::test]
    async fn delete_of_missing_contract_is_a_noop() {
        let h = harness(
            profile_with_usage(2, 3),
            MockAnalysis::succeeding(analysis_result()),
        );

        let deleted = delete_scan(&h.state, &h.user, Uuid::new_v4()).await.unwrap();
        assert!(!deleted);
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 2);
    }

    #[tokio::test]
    async fn delete_of_foreign_contract_is_a_noop() {
        let h = harness(
            profile_with_usage(1, 3),
            MockAnalysis::succeeding(analysis_result()),
        );
        let outcome = submit_scan(&h.state, &h.user, "contrat.pdf", b"%PDF")
            .await
            .unwrap();

        let stranger = AuthUser {
            id: Uuid::new_v4(),
            email: None,
            name: None,
        };
        let deleted = delete_scan(&h.state, &stranger, outcome.contract.id)
            .await
            .unwrap();
        assert!(!deleted);
        // The owner's contract and counter are untouched.
        assert!(h
            .db
            .get_contract(outcome.contract.id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(h.db.profile(h.user.id).documents_uploaded, 2);
    }
}
