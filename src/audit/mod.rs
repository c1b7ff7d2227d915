//! Audit logging
//!
//! Compliance records for interactions, executed transactions and security
//! alerts. Writes are best-effort and never fail or block the caller: the
//! in-memory backend pushes synchronously, the Postgres backend spawns its
//! insert. Interaction records carry message lengths, never raw content.

use crate::config::Settings;
use crate::models::{Intent, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditRecord {
    Interaction {
        timestamp: DateTime<Utc>,
        session_id: String,
        user_id: Option<String>,
        intent: String,
        message_length: usize,
        response_length: usize,
    },
    Transaction {
        timestamp: DateTime<Utc>,
        user_id: String,
        transaction_id: Uuid,
        transaction_type: String,
        result: String,
        reference: Option<String>,
    },
    SecurityAlert {
        timestamp: DateTime<Utc>,
        user_id: String,
        transaction_id: Uuid,
        reason: String,
        severity: String,
    },
}

impl AuditRecord {
    pub fn interaction(
        session_id: &str,
        user_id: Option<&str>,
        intent: Intent,
        message_length: usize,
        response_length: usize,
    ) -> Self {
        AuditRecord::Interaction {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            user_id: user_id.map(str::to_string),
            intent: intent.label().to_string(),
            message_length,
            response_length,
        }
    }

    pub fn transaction(transaction: &Transaction, result: &str) -> Self {
        AuditRecord::Transaction {
            timestamp: Utc::now(),
            user_id: transaction.user_id.clone(),
            transaction_id: transaction.id,
            transaction_type: transaction.kind.to_string(),
            result: result.to_string(),
            reference: transaction.reference.clone(),
        }
    }

    pub fn security_alert(user_id: &str, transaction_id: Uuid, reason: &str) -> Self {
        AuditRecord::SecurityAlert {
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            transaction_id,
            reason: reason.to_string(),
            severity: "high".to_string(),
        }
    }
}

enum AuditBackend {
    InMemory {
        records: Mutex<Vec<AuditRecord>>,
    },
    Postgres {
        pool: PgPool,
        schema_ready: Arc<OnceCell<()>>,
    },
}

/// Audit trail storage
pub struct AuditLog {
    backend: AuditBackend,
}

impl AuditLog {
    pub fn in_memory() -> Self {
        Self {
            backend: AuditBackend::InMemory {
                records: Mutex::new(Vec::new()),
            },
        }
    }

    /// Postgres-backed when `DATABASE_URL` is configured, in-memory
    /// otherwise. The pool connects lazily; schema init happens on first
    /// write.
    pub fn from_settings(settings: &Settings) -> Self {
        if let Some(url) = &settings.database_url {
            match PgPoolOptions::new().max_connections(5).connect_lazy(url) {
                Ok(pool) => {
                    info!("Audit backend: postgres");
                    return Self {
                        backend: AuditBackend::Postgres {
                            pool,
                            schema_ready: Arc::new(OnceCell::new()),
                        },
                    };
                }
                Err(error) => {
                    warn!(
                        "Failed to initialize postgres audit backend, falling back to in-memory: {}",
                        error
                    );
                }
            }
        }

        info!("Audit backend: in-memory");
        Self::in_memory()
    }

    /// Record an audit entry. Fire-and-forget: failures are logged and
    /// swallowed, the caller's request is never impacted.
    pub fn record(&self, record: AuditRecord) {
        if let AuditRecord::SecurityAlert {
            user_id, reason, ..
        } = &record
        {
            warn!(user_id = %user_id, reason = %reason, "SECURITY ALERT");
        } else {
            debug!(?record, "Audit record");
        }

        match &self.backend {
            AuditBackend::InMemory { records } => {
                if let Ok(mut records) = records.lock() {
                    records.push(record);
                }
            }
            AuditBackend::Postgres { pool, schema_ready } => {
                let pool = pool.clone();
                let schema_ready = schema_ready.clone();
                tokio::spawn(async move {
                    if let Err(error) = persist(&pool, &schema_ready, &record).await {
                        warn!("Audit write failed: {}", error);
                    }
                });
            }
        }
    }

    /// Most recent records, newest last. In-process inspection only; the
    /// Postgres backend answers with an empty list.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        match &self.backend {
            AuditBackend::InMemory { records } => {
                let records = match records.lock() {
                    Ok(records) => records,
                    Err(_) => return Vec::new(),
                };
                let skip = records.len().saturating_sub(limit);
                records[skip..].to_vec()
            }
            AuditBackend::Postgres { .. } => Vec::new(),
        }
    }
}

async fn persist(
    pool: &PgPool,
    schema_ready: &OnceCell<()>,
    record: &AuditRecord,
) -> std::result::Result<(), sqlx::Error> {
    schema_ready
        .get_or_try_init(|| async {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS audit_records (
                  record_id UUID PRIMARY KEY,
                  created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                  record TEXT NOT NULL
                );
                "#,
            )
            .execute(pool)
            .await?;

            Ok::<(), sqlx::Error>(())
        })
        .await?;

    let serialized = serde_json::to_string(record).unwrap_or_default();

    sqlx::query("INSERT INTO audit_records (record_id, created_at, record) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(serialized)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;

    #[test]
    fn test_in_memory_record_and_recent() {
        let log = AuditLog::in_memory();

        log.record(AuditRecord::interaction(
            "session-1",
            Some("user_001"),
            Intent::CheckBalance,
            17,
            120,
        ));
        log.record(AuditRecord::security_alert(
            "user_001",
            Uuid::new_v4(),
            "High transaction velocity",
        ));

        let records = log.recent(10);
        assert_eq!(records.len(), 2);

        match &records[0] {
            AuditRecord::Interaction {
                intent,
                message_length,
                ..
            } => {
                assert_eq!(intent, "check_balance");
                assert_eq!(*message_length, 17);
            }
            other => panic!("unexpected record: {:?}", other),
        }

        match &records[1] {
            AuditRecord::SecurityAlert { severity, .. } => assert_eq!(severity, "high"),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_transaction_record_carries_reference() {
        let log = AuditLog::in_memory();

        let mut tx = Transaction::new(TransactionType::LockCard, "user_002");
        tx.reference = Some("REF20260101ABCDEF".to_string());
        log.record(AuditRecord::transaction(&tx, "success"));

        match &log.recent(1)[0] {
            AuditRecord::Transaction {
                transaction_type,
                result,
                reference,
                ..
            } => {
                assert_eq!(transaction_type, "lock_card");
                assert_eq!(result, "success");
                assert_eq!(reference.as_deref(), Some("REF20260101ABCDEF"));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_recent_limit() {
        let log = AuditLog::in_memory();
        for i in 0..5 {
            log.record(AuditRecord::interaction(
                "s",
                None,
                Intent::Faq,
                i,
                i,
            ));
        }
        assert_eq!(log.recent(2).len(), 2);
    }
}
