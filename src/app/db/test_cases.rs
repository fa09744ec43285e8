use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for tests table. Title mirrors the latest version.
#[derive(Debug, Clone, FromRow)]
pub struct TestCase {
    pub id: String,
    pub project_id: String,
    pub code: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

/// Data structure for inserting a new test case.
pub struct NewTestCase {
    pub id: String,
    pub project_id: String,
    pub code: String,
    pub title: String,
}

/// Insert a new test case into the database.
pub async fn insert<'e, E>(executor: E, test: &NewTestCase) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query("INSERT INTO tests (id, project_id, code, title, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&test.id)
        .bind(&test.project_id)
        .bind(&test.code)
        .bind(&test.title)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(())
}

/// Find all test cases for a project, ordered by code.
pub async fn find_by_project<'e, E>(executor: E, project_id: &str) -> Result<Vec<TestCase>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, TestCase>(
        "SELECT id, project_id, code, title, created_at, updated_at FROM tests WHERE project_id = ? ORDER BY code",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

/// Whether `code` is already used in the project.
pub async fn code_taken<'e, E>(executor: E, project_id: &str, code: &str) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tests WHERE project_id = ? AND code = ?)")
        .bind(project_id)
        .bind(code)
        .fetch_one(executor)
        .await
}

/// Update a test case's title and updated_at timestamp.
pub async fn update_title<'e, E>(executor: E, id: &str, title: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query("UPDATE tests SET title = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Delete every test case of a project.
pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM tests WHERE project_id = ?")
        .bind(project_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
