use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for projects table.
#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub test_counter: i64,
    pub created_at: i64,
}

/// Data structure for inserting a new project.
pub struct NewProject {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Insert a new project into the database.
pub async fn insert<'e, E>(executor: E, project: &NewProject) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query(
        "INSERT INTO projects (id, name, slug, description, test_counter, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.slug)
    .bind(&project.description)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

/// Find a project by ID.
pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Project>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, Project>(
        "SELECT id, name, slug, description, test_counter, created_at FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Increment the project's test counter and return the new value.
/// Must run on the same transaction that uses the value.
pub async fn next_test_number<'e, E>(executor: E, project_id: &str) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        "UPDATE projects SET test_counter = test_counter + 1 WHERE id = ? RETURNING test_counter",
    )
    .bind(project_id)
    .fetch_one(executor)
    .await
}

/// Raise the test counter to at least `value`. Never lowers it.
pub async fn raise_test_counter<'e, E>(
    executor: E,
    project_id: &str,
    value: i64,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("UPDATE projects SET test_counter = MAX(test_counter, ?) WHERE id = ?")
        .bind(value)
        .bind(project_id)
        .execute(executor)
        .await?;

    Ok(())
}
