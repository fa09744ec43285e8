use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for suites table. `parent_id` is None for root suites.
#[derive(Debug, Clone, FromRow)]
pub struct Suite {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub order_key: String,
    pub created_at: i64,
}

/// Data structure for inserting a new suite.
pub struct NewSuite {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub order_key: String,
}

/// Sibling position: suite id and its order key.
#[derive(Debug, Clone, FromRow)]
pub struct SiblingKey {
    pub id: String,
    pub order_key: String,
}

/// Insert a new suite into the database.
pub async fn insert<'e, E>(executor: E, suite: &NewSuite) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query(
        "INSERT INTO suites (id, project_id, parent_id, name, order_key, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&suite.id)
    .bind(&suite.project_id)
    .bind(&suite.parent_id)
    .bind(&suite.name)
    .bind(&suite.order_key)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

/// Find all suites for a project, ordered by order key.
pub async fn find_by_project<'e, E>(executor: E, project_id: &str) -> Result<Vec<Suite>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, Suite>(
        "SELECT id, project_id, parent_id, name, order_key, created_at FROM suites WHERE project_id = ? ORDER BY order_key, name, id",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

/// Whether a suite named `name` exists directly under `parent_id` (None = root).
pub async fn name_taken<'e, E>(
    executor: E,
    project_id: &str,
    parent_id: Option<&str>,
    name: &str,
) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM suites WHERE project_id = ? AND parent_id IS ? AND name = ?)",
    )
    .bind(project_id)
    .bind(parent_id)
    .bind(name)
    .fetch_one(executor)
    .await
}

/// Children of `parent_id` (None = root suites) in order.
pub async fn find_sibling_keys<'e, E>(
    executor: E,
    project_id: &str,
    parent_id: Option<&str>,
) -> Result<Vec<SiblingKey>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, SiblingKey>(
        "SELECT id, order_key FROM suites WHERE project_id = ? AND parent_id IS ? ORDER BY order_key, id",
    )
    .bind(project_id)
    .bind(parent_id)
    .fetch_all(executor)
    .await
}

/// Set a suite's order key.
pub async fn update_order_key<'e, E>(executor: E, id: &str, order_key: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("UPDATE suites SET order_key = ? WHERE id = ?")
        .bind(order_key)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Delete every suite of a project.
pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM suites WHERE project_id = ?")
        .bind(project_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
