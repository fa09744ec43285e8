use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for test_versions table. `content` is the JSON-encoded TestContent.
#[derive(Debug, Clone, FromRow)]
pub struct TestVersion {
    pub id: String,
    pub test_id: String,
    pub version: i64,
    pub title: String,
    pub content: String,
    pub fingerprint: String,
    pub created_at: i64,
}

/// Data structure for inserting a new test version.
pub struct NewTestVersion {
    pub id: String,
    pub test_id: String,
    pub version: i64,
    pub title: String,
    pub content: String,
    pub fingerprint: String,
}

/// Insert a new version row.
pub async fn insert<'e, E>(executor: E, version: &NewTestVersion) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query(
        "INSERT INTO test_versions (id, test_id, version, title, content, fingerprint, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&version.id)
    .bind(&version.test_id)
    .bind(version.version)
    .bind(&version.title)
    .bind(&version.content)
    .bind(&version.fingerprint)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

/// Latest version of a test, if it has any.
pub async fn find_latest<'e, E>(executor: E, test_id: &str) -> Result<Option<TestVersion>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, TestVersion>(
        "SELECT id, test_id, version, title, content, fingerprint, created_at FROM test_versions WHERE test_id = ? ORDER BY version DESC LIMIT 1",
    )
    .bind(test_id)
    .fetch_optional(executor)
    .await
}

/// Latest version of every test in a project that has at least one version.
pub async fn find_latest_by_project<'e, E>(
    executor: E,
    project_id: &str,
) -> Result<Vec<TestVersion>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, TestVersion>(
        "SELECT v.id, v.test_id, v.version, v.title, v.content, v.fingerprint, v.created_at FROM test_versions v INNER JOIN tests t ON t.id = v.test_id WHERE t.project_id = ? AND v.version = (SELECT MAX(version) FROM test_versions WHERE test_id = v.test_id)",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

/// Count versions of a test.
pub async fn count_for_test<'e, E>(executor: E, test_id: &str) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM test_versions WHERE test_id = ?")
        .bind(test_id)
        .fetch_one(executor)
        .await
}

/// Delete every version of every test in a project.
pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "DELETE FROM test_versions WHERE test_id IN (SELECT id FROM tests WHERE project_id = ?)",
    )
    .bind(project_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
