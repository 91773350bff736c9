//! Repository for the append-only `audit_logs` table.
//!
//! Appends are serialized with a transaction-scoped advisory lock so every
//! entry hashes over the true previous entry.

use chrono::{SubsecRound, Utc};
use kindred_core::audit::{compute_integrity_hash, redact_sensitive_fields, AuditEntryData};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::models::audit::{AuditLog, AuditQuery, ChainVerification, CreateAuditLog};

const COLUMNS: &str = "id, timestamp, user_id, action_type, entity_type, entity_id, \
                       details_json, ip_address, user_agent, integrity_hash, created_at";

/// Advisory lock key guarding the hash chain tail.
const CHAIN_LOCK_KEY: i64 = 0x4B44_5241_5544_4954;

/// Rows fetched per round trip while verifying the chain.
const VERIFY_BATCH_SIZE: i64 = 1000;

pub struct AuditRepo;

impl AuditRepo {
    /// Append an entry, chaining its hash onto the latest entry.
    pub async fn append(pool: &PgPool, input: &CreateAuditLog) -> Result<AuditLog, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let entry = Self::append_in_tx(&mut tx, input).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Append within a caller's transaction, so the entry commits or rolls
    /// back with the change it records. The chain lock is held until that
    /// transaction ends.
    pub async fn append_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateAuditLog,
    ) -> Result<AuditLog, sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CHAIN_LOCK_KEY)
            .execute(&mut **tx)
            .await?;

        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT integrity_hash FROM audit_logs ORDER BY id DESC LIMIT 1")
                .fetch_optional(&mut **tx)
                .await?;

        let details = input.details_json.as_ref().map(redact_sensitive_fields);
        // PostgreSQL keeps microseconds; hash what will be stored.
        let timestamp = Utc::now().trunc_subsecs(6);
        let data = AuditEntryData {
            timestamp,
            user_id: input.user_id,
            action_type: &input.action_type,
            entity_type: input.entity_type.as_deref(),
            entity_id: input.entity_id,
            details_json: details.as_ref(),
        };
        let integrity_hash = compute_integrity_hash(prev_hash.as_deref(), &data.canonical());

        let query = format!(
            "INSERT INTO audit_logs (timestamp, user_id, action_type, entity_type, entity_id,
                                     details_json, ip_address, user_agent, integrity_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, AuditLog>(&query)
            .bind(timestamp)
            .bind(input.user_id)
            .bind(&input.action_type)
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .bind(&details)
            .bind(&input.ip_address)
            .bind(&input.user_agent)
            .bind(&integrity_hash)
            .fetch_one(&mut **tx)
            .await?;

        Ok(entry)
    }

    /// Filtered page of entries, newest first, with the total match count.
    pub async fn query(
        pool: &PgPool,
        params: &AuditQuery,
    ) -> Result<(Vec<AuditLog>, i64), sqlx::Error> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs");
        push_filters(&mut count_qb, params);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM audit_logs"));
        push_filters(&mut qb, params);
        qb.push(" ORDER BY id DESC LIMIT ");
        qb.push_bind(params.limit);
        qb.push(" OFFSET ");
        qb.push_bind(params.offset);
        let rows = qb.build_query_as::<AuditLog>().fetch_all(pool).await?;

        Ok((rows, total))
    }

    /// Recompute every hash in id order and report the first mismatch.
    pub async fn verify_chain(pool: &PgPool) -> Result<ChainVerification, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs WHERE id > $1 ORDER BY id ASC LIMIT $2"
        );
        let mut after_id = 0;
        let mut prev_hash: Option<String> = None;
        let mut checked = 0;

        loop {
            let batch = sqlx::query_as::<_, AuditLog>(&query)
                .bind(after_id)
                .bind(VERIFY_BATCH_SIZE)
                .fetch_all(pool)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for entry in &batch {
                checked += 1;
                let data = AuditEntryData {
                    timestamp: entry.timestamp,
                    user_id: entry.user_id,
                    action_type: &entry.action_type,
                    entity_type: entry.entity_type.as_deref(),
                    entity_id: entry.entity_id,
                    details_json: entry.details_json.as_ref(),
                };
                let expected = compute_integrity_hash(prev_hash.as_deref(), &data.canonical());
                if expected != entry.integrity_hash {
                    return Ok(ChainVerification {
                        entries_checked: checked,
                        is_intact: false,
                        first_broken_id: Some(entry.id),
                    });
                }
                prev_hash = Some(entry.integrity_hash.clone());
            }
        }

        Ok(ChainVerification {
            entries_checked: checked,
            is_intact: true,
            first_broken_id: None,
        })
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, params: &AuditQuery) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = params.user_id {
        qb.push(" AND user_id = ");
        qb.push_bind(user_id);
    }
    if let Some(action_type) = &params.action_type {
        qb.push(" AND action_type = ");
        qb.push_bind(action_type.clone());
    }
    if let Some(from) = params.from {
        qb.push(" AND timestamp >= ");
        qb.push_bind(from);
    }
    if let Some(to) = params.to {
        qb.push(" AND timestamp <= ");
        qb.push_bind(to);
    }
}
