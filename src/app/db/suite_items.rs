use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for suite_items table (test placed in a suite).
#[derive(Debug, Clone, FromRow)]
pub struct SuiteItem {
    pub suite_id: String,
    pub test_id: String,
    pub order_key: String,
    pub created_at: i64,
}

/// Data structure for linking a test into a suite.
pub struct NewSuiteItem {
    pub suite_id: String,
    pub test_id: String,
    pub order_key: String,
}

/// Link a test into a suite.
pub async fn insert<'e, E>(executor: E, item: &NewSuiteItem) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query("INSERT INTO suite_items (suite_id, test_id, order_key, created_at) VALUES (?, ?, ?, ?)")
        .bind(&item.suite_id)
        .bind(&item.test_id)
        .bind(&item.order_key)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(())
}

/// Items of one suite in order.
pub async fn find_by_suite<'e, E>(executor: E, suite_id: &str) -> Result<Vec<SuiteItem>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, SuiteItem>(
        "SELECT suite_id, test_id, order_key, created_at FROM suite_items WHERE suite_id = ? ORDER BY order_key, test_id",
    )
    .bind(suite_id)
    .fetch_all(executor)
    .await
}

/// Items of every suite in a project, grouped by suite and ordered within it.
pub async fn find_by_project<'e, E>(executor: E, project_id: &str) -> Result<Vec<SuiteItem>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, SuiteItem>(
        "SELECT i.suite_id, i.test_id, i.order_key, i.created_at FROM suite_items i INNER JOIN suites s ON s.id = i.suite_id WHERE s.project_id = ? ORDER BY i.suite_id, i.order_key, i.test_id",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

/// Set an item's order key.
pub async fn update_order_key<'e, E>(
    executor: E,
    suite_id: &str,
    test_id: &str,
    order_key: &str,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("UPDATE suite_items SET order_key = ? WHERE suite_id = ? AND test_id = ?")
        .bind(order_key)
        .bind(suite_id)
        .bind(test_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Delete every suite item of a project.
pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM suite_items WHERE suite_id IN (SELECT id FROM suites WHERE project_id = ?)")
        .bind(project_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
