//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `DatabaseService` port from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use assurscan_core::domain::{
    Amounts, ChatMessage, ChatRole, Contract, ContractStatus, CoverageGap, Profile,
    Recommendation, SubscriptionPlan, User, UserRole, UserStats,
};
use assurscan_core::ports::{ContractFilter, DatabaseService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: Option<String>,
    email: Option<String>,
    login_method: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    last_signed_in: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        let role = match self.role.as_str() {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        };
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            login_method: self.login_method,
            role,
            created_at: self.created_at,
            last_signed_in: self.last_signed_in,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    avatar_url: Option<String>,
    subscription_plan: String,
    documents_uploaded: i32,
    documents_limit: i32,
}

impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        let subscription_plan = self
            .subscription_plan
            .parse::<SubscriptionPlan>()
            .map_err(PortError::Unexpected)?;
        Ok(Profile {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            subscription_plan,
            documents_uploaded: self.documents_uploaded,
            documents_limit: self.documents_limit,
        })
    }
}

#[derive(FromRow)]
struct ContractRecord {
    id: Uuid,
    user_id: Uuid,
    file_name: String,
    file_url: String,
    contract_type: String,
    status: String,
    extracted_text: String,
    main_coverages: Json<Vec<String>>,
    amounts: Json<Amounts>,
    exclusions: Json<Vec<String>>,
    optimization_score: i32,
    potential_savings: f64,
    coverage_gaps: Json<Vec<CoverageGap>>,
    recommendations: Json<Vec<Recommendation>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ContractRecord {
    fn to_domain(self) -> PortResult<Contract> {
        let status = self
            .status
            .parse::<ContractStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(Contract {
            id: self.id,
            user_id: self.user_id,
            file_name: self.file_name,
            file_url: self.file_url,
            contract_type: self.contract_type,
            status,
            extracted_text: self.extracted_text,
            main_coverages: self.main_coverages.0,
            amounts: self.amounts.0,
            exclusions: self.exclusions.0,
            optimization_score: self.optimization_score,
            potential_savings: self.potential_savings,
            coverage_gaps: self.coverage_gaps.0,
            recommendations: self.recommendations.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    user_id: Uuid,
    contract_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl ChatMessageRecord {
    fn to_domain(self) -> ChatMessage {
        let role = match self.role.as_str() {
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        };
        ChatMessage {
            id: self.id,
            user_id: self.user_id,
            contract_id: self.contract_id,
            role,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct StatsRecord {
    total_contracts: i64,
    total_savings: f64,
    avg_score: f64,
}

const CONTRACT_COLUMNS: &str = "id, user_id, file_name, file_url, contract_type, status, \
     extracted_text, main_coverages, amounts, exclusions, optimization_score, \
     potential_savings, coverage_gaps, recommendations, created_at, updated_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn upsert_user(&self, user: &User) -> PortResult<()> {
        let role = match user.role {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        };
        sqlx::query(
            "INSERT INTO users (id, name, email, login_method, role, created_at, last_signed_in) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 email = EXCLUDED.email, \
                 login_method = EXCLUDED.login_method, \
                 role = EXCLUDED.role, \
                 last_signed_in = EXCLUDED.last_signed_in",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.login_method)
        .bind(role)
        .bind(user.created_at)
        .bind(user.last_signed_in)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, login_method, role, created_at, last_signed_in \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, email, full_name, avatar_url, subscription_plan, \
                    documents_uploaded, documents_limit \
             FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(ProfileRecord::to_domain).transpose()
    }

    async fn upsert_profile(&self, profile: &Profile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, email, full_name, avatar_url, subscription_plan, \
                                   documents_uploaded, documents_limit) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 full_name = EXCLUDED.full_name, \
                 avatar_url = EXCLUDED.avatar_url, \
                 subscription_plan = EXCLUDED.subscription_plan, \
                 documents_uploaded = EXCLUDED.documents_uploaded, \
                 documents_limit = EXCLUDED.documents_limit, \
                 updated_at = now()",
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.subscription_plan.as_str())
        .bind(profile.documents_uploaded)
        .bind(profile.documents_limit)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn increment_documents_uploaded(&self, user_id: Uuid) -> PortResult<()> {
        // Single-statement update; two concurrent scans cannot lose a count.
        sqlx::query(
            "UPDATE profiles SET documents_uploaded = documents_uploaded + 1, \
                                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn decrement_documents_uploaded(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE profiles SET documents_uploaded = GREATEST(documents_uploaded - 1, 0), \
                                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn create_contract(&self, contract: &Contract) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO contracts (id, user_id, file_name, file_url, contract_type, status, \
                 extracted_text, main_coverages, amounts, exclusions, optimization_score, \
                 potential_savings, coverage_gaps, recommendations, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(contract.id)
        .bind(contract.user_id)
        .bind(&contract.file_name)
        .bind(&contract.file_url)
        .bind(&contract.contract_type)
        .bind(contract.status.as_str())
        .bind(&contract.extracted_text)
        .bind(Json(&contract.main_coverages))
        .bind(Json(&contract.amounts))
        .bind(Json(&contract.exclusions))
        .bind(contract.optimization_score)
        .bind(contract.potential_savings)
        .bind(Json(&contract.coverage_gaps))
        .bind(Json(&contract.recommendations))
        .bind(contract.created_at)
        .bind(contract.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_contract(&self, contract_id: Uuid) -> PortResult<Option<Contract>> {
        let record = sqlx::query_as::<_, ContractRecord>(&format!(
            "SELECT {} FROM contracts WHERE id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(ContractRecord::to_domain).transpose()
    }

    async fn list_contracts(
        &self,
        user_id: Uuid,
        filter: &ContractFilter,
    ) -> PortResult<Vec<Contract>> {
        let records = sqlx::query_as::<_, ContractRecord>(&format!(
            "SELECT {} FROM contracts \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR contract_type = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY created_at DESC",
            CONTRACT_COLUMNS
        ))
        .bind(user_id)
        .bind(&filter.contract_type)
        .bind(&filter.status)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records
            .into_iter()
            .map(ContractRecord::to_domain)
            .collect()
    }

    async fn delete_contract(&self, contract_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        // Ownership is part of the statement, so a foreign contract id
        // deletes nothing and reports false. Chat messages cascade.
        let result = sqlx::query("DELETE FROM contracts WHERE id = $1 AND user_id = $2")
            .bind(contract_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_stats(&self, user_id: Uuid) -> PortResult<UserStats> {
        let record = sqlx::query_as::<_, StatsRecord>(
            "SELECT COUNT(*) AS total_contracts, \
                    COALESCE(SUM(potential_savings), 0)::double precision AS total_savings, \
                    COALESCE(AVG(optimization_score), 0)::double precision AS avg_score \
             FROM contracts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(UserStats {
            total_contracts: record.total_contracts,
            total_savings: record.total_savings,
            avg_score: record.avg_score.round() as i32,
        })
    }

    async fn create_chat_message(&self, message: &ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, user_id, contract_id, role, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.user_id)
        .bind(message.contract_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn chat_history(&self, contract_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>> {
        let mut records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, user_id, contract_id, role, content, created_at \
             FROM chat_messages WHERE contract_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(contract_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        // Fetched newest-first to honor the limit; return chronologically.
        records.reverse();
        Ok(records
            .into_iter()
            .map(ChatMessageRecord::to_domain)
            .collect())
    }
}
