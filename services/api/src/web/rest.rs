//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::{port_error_status, NOT_FOUND_OR_FORBIDDEN};
use crate::web::middleware::AuthUser;
use crate::web::scan::{delete_scan, submit_scan, ScanError};
use crate::web::state::AppState;
use assurscan_core::domain::{
    ChatMessage, ChatRole, ChatTurn, CheckoutParams, Contract, Profile, SubscriptionPlan, User,
    UserRole,
};
use assurscan_core::ports::{ContractFilter, PortError};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        me_handler,
        get_profile_handler,
        update_profile_handler,
        scan_contract_handler,
        list_contracts_handler,
        get_contract_handler,
        delete_contract_handler,
        stats_handler,
        chat_send_handler,
        chat_history_handler,
        checkout_handler,
    ),
    components(
        schemas(
            ScanRequest,
            UpdateProfileRequest,
            ChatSendRequest,
            ChatSendResponse,
            CheckoutRequest,
            CheckoutResponse,
            DeleteContractResponse,
        )
    ),
    tags(
        (name = "AssurScan API", description = "Contract analysis, chat assistant and billing endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// The scan submission payload: a file name plus base64-encoded bytes.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub file_name: String,
    /// The raw document, base64 encoded.
    pub file_data: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendRequest {
    pub contract_id: Uuid,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatSendResponse {
    pub success: bool,
    pub response: String,
    pub timestamp: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Target plan: "premium" or "enterprise".
    pub plan: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteContractResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub profile: Profile,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub contract: Contract,
    pub analysis: assurscan_core::domain::AnalysisResult,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ContractListQuery {
    pub contract_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

//=========================================================================================
// Error Mapping Helpers
//=========================================================================================

fn port_response(e: PortError) -> (StatusCode, String) {
    (port_error_status(&e), e.to_string())
}

/// Maps a scan workflow failure onto the HTTP surface.
pub(crate) fn scan_error_response(e: ScanError) -> (StatusCode, String) {
    match e {
        ScanError::QuotaExceeded { .. } => (StatusCode::FORBIDDEN, e.to_string()),
        ScanError::ProfileNotFound => (StatusCode::NOT_FOUND, e.to_string()),
        ScanError::Extraction(_) => (StatusCode::BAD_GATEWAY, e.to_string()),
        ScanError::Upload(ref inner)
        | ScanError::Analysis(ref inner)
        | ScanError::Persistence(ref inner) => (port_error_status(inner), e.to_string()),
    }
}

/// Fetches a contract and enforces ownership with a uniform error, so a
/// caller cannot distinguish "does not exist" from "not yours".
async fn owned_contract(
    state: &AppState,
    user: &AuthUser,
    contract_id: Uuid,
) -> Result<Contract, (StatusCode, String)> {
    let contract = state
        .db
        .get_contract(contract_id)
        .await
        .map_err(port_response)?;
    match contract {
        Some(c) if c.user_id == user.id => Ok(c),
        _ => Err((StatusCode::NOT_FOUND, NOT_FOUND_OR_FORBIDDEN.to_string())),
    }
}

//=========================================================================================
// Identity and Profile Handlers
//=========================================================================================

/// Upsert the authenticated user and lazily provision their profile.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The user record with its profile"),
        (status = 401, description = "Missing or invalid identity headers"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let now = Utc::now();
    let role = if state.config.owner_id == Some(auth.id) {
        UserRole::Admin
    } else {
        UserRole::User
    };
    let user = User {
        id: auth.id,
        name: auth.name.clone(),
        email: auth.email.clone(),
        login_method: None,
        role,
        created_at: now,
        last_signed_in: now,
    };
    state.db.upsert_user(&user).await.map_err(port_response)?;

    // Auto-create the profile if it doesn't exist yet.
    let profile = match state.db.get_profile(auth.id).await.map_err(port_response)? {
        Some(profile) => profile,
        None => {
            let profile = Profile::new_free(auth.id, auth.email.clone(), auth.name.clone());
            state
                .db
                .upsert_profile(&profile)
                .await
                .map_err(port_response)?;
            profile
        }
    };

    let user = state.db.get_user(auth.id).await.map_err(port_response)?;
    Ok(Json(MeResponse { user, profile }))
}

/// Fetch the authenticated user's profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The profile"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .db
        .get_profile(auth.id)
        .await
        .map_err(port_response)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;
    Ok(Json(profile))
}

/// Update the profile's display fields.
#[utoipa::path(
    patch,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "The updated profile"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut profile = state
        .db
        .get_profile(auth.id)
        .await
        .map_err(port_response)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;

    if let Some(full_name) = req.full_name {
        profile.full_name = Some(full_name);
    }
    if let Some(avatar_url) = req.avatar_url {
        profile.avatar_url = Some(avatar_url);
    }

    state
        .db
        .upsert_profile(&profile)
        .await
        .map_err(port_response)?;
    Ok(Json(profile))
}

//=========================================================================================
// Contract Handlers
//=========================================================================================

/// Submit a document for analysis.
#[utoipa::path(
    post,
    path = "/contracts/scan",
    request_body = ScanRequest,
    responses(
        (status = 201, description = "The persisted contract plus the raw analysis"),
        (status = 400, description = "Malformed base64 payload"),
        (status = 403, description = "Document quota reached"),
        (status = 502, description = "Upstream collaborator failure")
    )
)]
pub async fn scan_contract_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let file_bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.file_data)
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid base64 file data: {}", e),
            )
        })?;

    let outcome = submit_scan(&state, &auth, &req.file_name, &file_bytes)
        .await
        .map_err(|e| {
            error!(user_id = %auth.id, error = %e, "Scan submission failed");
            scan_error_response(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ScanResponse {
            contract: outcome.contract,
            analysis: outcome.analysis,
        }),
    ))
}

/// List the authenticated user's contracts, newest first.
#[utoipa::path(
    get,
    path = "/contracts",
    params(ContractListQuery),
    responses(
        (status = 200, description = "The contracts, optionally filtered by type and status")
    )
)]
pub async fn list_contracts_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ContractListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let filter = ContractFilter {
        contract_type: query.contract_type,
        status: query.status,
    };
    let contracts = state
        .db
        .list_contracts(auth.id, &filter)
        .await
        .map_err(port_response)?;
    Ok(Json(contracts))
}

/// Fetch one contract by id.
#[utoipa::path(
    get,
    path = "/contracts/{id}",
    params(("id" = Uuid, Path, description = "The contract id")),
    responses(
        (status = 200, description = "The contract"),
        (status = 404, description = "Contract not found or access denied")
    )
)]
pub async fn get_contract_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let contract = owned_contract(&state, &auth, id).await?;
    Ok(Json(contract))
}

/// Delete one contract and release its quota slot.
#[utoipa::path(
    delete,
    path = "/contracts/{id}",
    params(("id" = Uuid, Path, description = "The contract id")),
    responses(
        (status = 200, description = "Whether a contract was actually deleted", body = DeleteContractResponse)
    )
)]
pub async fn delete_contract_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let success = delete_scan(&state, &auth, id).await.map_err(port_response)?;
    Ok(Json(DeleteContractResponse { success }))
}

/// Aggregate statistics over the user's contracts.
#[utoipa::path(
    get,
    path = "/contracts/stats",
    responses(
        (status = 200, description = "Contract count, cumulated savings and average score")
    )
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stats = state.db.user_stats(auth.id).await.map_err(port_response)?;
    Ok(Json(stats))
}

//=========================================================================================
// Chat Handlers
//=========================================================================================

/// Send a chat message about one analyzed contract.
///
/// Persists the user message, asks the assistant with the last 10 prior
/// turns as context, persists the assistant reply. Messages are therefore
/// always appended in pairs.
#[utoipa::path(
    post,
    path = "/chat/send",
    request_body = ChatSendRequest,
    responses(
        (status = 200, description = "The assistant's reply", body = ChatSendResponse),
        (status = 404, description = "Contract not found or access denied"),
        (status = 502, description = "Upstream LLM failure")
    )
)]
pub async fn chat_send_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<ChatSendRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let contract = owned_contract(&state, &auth, req.contract_id).await?;

    // Prior turns only; the new message travels separately.
    let history: Vec<ChatTurn> = state
        .db
        .chat_history(req.contract_id, 10)
        .await
        .map_err(port_response)?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role,
            content: m.content,
        })
        .collect();

    let user_message = ChatMessage {
        id: Uuid::new_v4(),
        user_id: auth.id,
        contract_id: req.contract_id,
        role: ChatRole::User,
        content: req.message.clone(),
        created_at: Utc::now(),
    };
    state
        .db
        .create_chat_message(&user_message)
        .await
        .map_err(port_response)?;

    let reply = state
        .chat
        .reply(&req.message, &contract.summary(), &history)
        .await
        .map_err(|e| {
            error!(contract_id = %req.contract_id, error = %e, "Chat reply failed");
            port_response(e)
        })?;

    let assistant_message = ChatMessage {
        id: Uuid::new_v4(),
        user_id: auth.id,
        contract_id: req.contract_id,
        role: ChatRole::Assistant,
        content: reply.clone(),
        created_at: Utc::now(),
    };
    state
        .db
        .create_chat_message(&assistant_message)
        .await
        .map_err(port_response)?;

    Ok(Json(ChatSendResponse {
        success: true,
        response: reply,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Fetch a contract's chat history in chronological order.
#[utoipa::path(
    get,
    path = "/chat/{contract_id}/history",
    params(
        ("contract_id" = Uuid, Path, description = "The contract id"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "The messages, oldest first"),
        (status = 404, description = "Contract not found or access denied")
    )
)]
pub async fn chat_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(contract_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    owned_contract(&state, &auth, contract_id).await?;

    let messages = state
        .db
        .chat_history(contract_id, query.limit.unwrap_or(50))
        .await
        .map_err(port_response)?;
    Ok(Json(messages))
}

//=========================================================================================
// Billing Handlers
//=========================================================================================

/// Create a hosted checkout session for a plan upgrade.
#[utoipa::path(
    post,
    path = "/billing/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "The hosted checkout redirect URL", body = CheckoutResponse),
        (status = 400, description = "Unknown or non-upgradable plan"),
        (status = 500, description = "Price id not configured for the plan")
    )
)]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plan = req.plan.parse::<SubscriptionPlan>().map_err(|e| {
        (StatusCode::BAD_REQUEST, e)
    })?;
    if plan == SubscriptionPlan::Free {
        return Err((
            StatusCode::BAD_REQUEST,
            "The free plan has no checkout".to_string(),
        ));
    }

    let price_id = state.config.price_id_for_plan(plan).ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Price ID not configured for plan: {}", plan.as_str()),
        )
    })?;

    let params = CheckoutParams {
        price_id: price_id.to_string(),
        user_id: auth.id,
        user_email: auth.email.clone().unwrap_or_default(),
        success_url: format!("{}/dashboard?payment=success", state.config.app_url),
        cancel_url: format!("{}/pricing?payment=cancelled", state.config.app_url),
    };

    let session = state
        .billing
        .create_checkout_session(&params)
        .await
        .map_err(port_response)?;
    Ok(Json(CheckoutResponse { url: session.url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_rejection_surfaces_as_forbidden() {
        let (status, message) = scan_error_response(ScanError::QuotaExceeded { used: 3, limit: 3 });
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(message.contains("3/3"));
        assert!(message.contains("upgrade"));
    }

    #[test]
    fn upstream_analysis_failure_surfaces_as_bad_gateway() {
        let e = ScanError::Analysis(PortError::Upstream {
            status: 500,
            message: "model error".to_string(),
        });
        let (status, message) = scan_error_response(e);
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(message.contains("500"));
    }

    #[test]
    fn missing_llm_key_surfaces_as_internal() {
        let e = ScanError::Analysis(PortError::MissingConfig("OPENROUTER_API_KEY".to_string()));
        let (status, _) = scan_error_response(e);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
