use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for import_audit table. `summary` holds the JSON counts.
#[derive(Debug, Clone, FromRow)]
pub struct ImportAudit {
    pub id: String,
    pub project_id: String,
    pub mode: String,
    pub summary: String,
    pub created_at: i64,
}

/// Data structure for recording an import.
pub struct NewImportAudit {
    pub id: String,
    pub project_id: String,
    pub mode: String,
    pub summary: String,
}

/// Record one completed import.
pub async fn insert<'e, E>(executor: E, entry: &NewImportAudit) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query("INSERT INTO import_audit (id, project_id, mode, summary, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&entry.id)
        .bind(&entry.project_id)
        .bind(&entry.mode)
        .bind(&entry.summary)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(())
}

/// Imports into a project, newest first.
pub async fn find_by_project<'e, E>(executor: E, project_id: &str) -> Result<Vec<ImportAudit>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, ImportAudit>(
        "SELECT id, project_id, mode, summary, created_at FROM import_audit WHERE project_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}
