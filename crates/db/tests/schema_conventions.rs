use sqlx::PgPool;

/// Append-only tables carry `created_at` but no `updated_at`.
const APPEND_ONLY: &[&str] = &["audit_logs", "swipes", "messages", "notifications"];

async fn public_tables(pool: &PgPool) -> Vec<String> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name
         FROM information_schema.tables
         WHERE table_schema = 'public'
           AND table_type = 'BASE TABLE'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(pool)
    .await
    .unwrap();
    rows.into_iter().map(|(t,)| t).collect()
}

/// All `id` columns must be bigint.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_pks_are_bigint(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, data_type) in &rows {
        assert_eq!(data_type, "bigint", "Table {table}.id should be bigint");
    }
}

/// Every table has timestamptz timestamps; mutable tables also have `updated_at`.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_tables_have_timestamps(pool: PgPool) {
    for table in public_tables(&pool).await {
        let mut cols = vec!["created_at"];
        if !APPEND_ONLY.contains(&table.as_str()) {
            cols.push("updated_at");
        }
        for col in cols {
            let result: Option<(String,)> = sqlx::query_as(
                "SELECT data_type
                 FROM information_schema.columns
                 WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
            )
            .bind(&table)
            .bind(col)
            .fetch_optional(&pool)
            .await
            .unwrap();

            let (data_type,) =
                result.unwrap_or_else(|| panic!("Table {table} is missing column {col}"));
            assert_eq!(
                data_type, "timestamp with time zone",
                "Table {table}.{col} should be timestamptz, got {data_type}"
            );
        }
    }
}

/// Unique constraints follow the `uq_` naming the API error mapping relies on.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unique_constraints_are_prefixed(pool: PgPool) {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT conname::TEXT
         FROM pg_constraint c
         JOIN pg_namespace n ON n.oid = c.connamespace
         WHERE n.nspname = 'public' AND c.contype = 'u'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (name,) in &rows {
        assert!(name.starts_with("uq_"), "Unique constraint {name} should start with uq_");
    }
}

/// Mutable tables keep `updated_at` current through the shared trigger.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_updated_at_triggers_exist(pool: PgPool) {
    for table in public_tables(&pool).await {
        if APPEND_ONLY.contains(&table.as_str()) {
            continue;
        }
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM information_schema.triggers
                 WHERE event_object_table = $1 AND trigger_name = 'set_updated_at'
             )",
        )
        .bind(&table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "Table {table} should have the set_updated_at trigger");
    }
}
