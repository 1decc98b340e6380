//! PostgreSQL implementation of HistoryLog.
//!
//! Turns live in `conversation_turns`; the `BIGSERIAL` sequence column is
//! the ordering key, so concurrent appends to one session never collide.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::config::DatabaseConfig;
use crate::domain::assistant::{ConversationTurn, IntentLabel, NewTurn, TurnMetadata, TurnRole};
use crate::domain::foundation::{DomainError, SessionId, Timestamp, TurnId};
use crate::ports::HistoryLog;

/// PostgreSQL implementation of HistoryLog.
#[derive(Clone)]
pub struct PostgresHistoryLog {
    pool: PgPool,
}

impl PostgresHistoryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from configuration, running migrations when asked to.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::database(format!("Failed to connect: {}", e)))?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))?;
        }

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl HistoryLog for PostgresHistoryLog {
    async fn append(&self, turn: NewTurn) -> Result<TurnId, DomainError> {
        let id = turn.id;

        sqlx::query(
            r#"
            INSERT INTO conversation_turns (id, session_id, role, content, intent, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(turn.session_id.as_str())
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.intent.map(|i| i.as_str()))
        .bind(serde_json::Value::Object(turn.metadata))
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert turn: {}", e)))?;

        Ok(id)
    }

    async fn query(&self, session_id: &SessionId, limit: usize) -> Result<Vec<ConversationTurn>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, session_id, role, content, intent, metadata, created_at
            FROM (
                SELECT * FROM conversation_turns
                WHERE session_id = $1
                ORDER BY sequence DESC
                LIMIT $2
            ) recent
            ORDER BY sequence ASC
            "#,
        )
        .bind(session_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to query turns: {}", e)))?;

        rows.iter().map(row_to_turn).collect()
    }
}

fn row_to_turn(row: &sqlx::postgres::PgRow) -> Result<ConversationTurn, DomainError> {
    let column = |e: sqlx::Error| DomainError::database(format!("Failed to read turn row: {}", e));

    let sequence: i64 = row.try_get("sequence").map_err(column)?;
    let id: uuid::Uuid = row.try_get("id").map_err(column)?;
    let session_id: String = row.try_get("session_id").map_err(column)?;
    let role: String = row.try_get("role").map_err(column)?;
    let intent: Option<String> = row.try_get("intent").map_err(column)?;
    let metadata: serde_json::Value = row.try_get("metadata").map_err(column)?;
    let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at").map_err(column)?;

    let role = TurnRole::parse(&role)
        .ok_or_else(|| DomainError::database(format!("Invalid role in history: {}", role)))?;
    let session_id = SessionId::new(session_id)?;
    let metadata = match metadata {
        serde_json::Value::Object(map) => map,
        _ => TurnMetadata::new(),
    };

    Ok(ConversationTurn {
        id: TurnId::from_uuid(id),
        sequence: sequence.max(0) as u64,
        session_id,
        role,
        content: row.try_get("content").map_err(column)?,
        intent: intent.as_deref().and_then(IntentLabel::parse_label),
        metadata,
        timestamp: Timestamp::from_datetime(created_at),
    })
}
