use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the service tables when missing. Safe to run on every startup.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS api_configs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            api_url TEXT NOT NULL,
            api_key TEXT NOT NULL,
            dingtalk JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Single-row table holding the active configuration id. The CHECK pins
    // the key so at most one row can ever exist.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS current_config (
            singleton BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton),
            config_id TEXT REFERENCES api_configs(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS report_history (
            id UUID PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            prev_week_plan TEXT NOT NULL,
            prev_week_work TEXT NOT NULL,
            curr_week_plan TEXT NOT NULL,
            prev_week_additional_notes TEXT NOT NULL DEFAULT '',
            raw_output TEXT NOT NULL,
            cleaned_output TEXT NOT NULL,
            is_json BOOLEAN NOT NULL,
            json_data JSONB,
            formatted_html TEXT NOT NULL,
            config_id TEXT,
            config_name TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config_backups (
            id UUID PRIMARY KEY,
            taken_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            document JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
