use sqlx::FromRow;

/// Tag name attached to a test, as read for export.
#[derive(Debug, Clone, FromRow)]
pub struct TestTagName {
    pub test_id: String,
    pub tag_name: String,
}

/// Attach a tag to a test. Attaching twice is a no-op.
pub async fn insert_if_not_exists<'e, E>(executor: E, test_id: &str, tag_id: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO test_tags (test_id, tag_id) VALUES (?, ?)")
        .bind(test_id)
        .bind(tag_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Detach every tag from a test.
pub async fn delete_for_test<'e, E>(executor: E, test_id: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("DELETE FROM test_tags WHERE test_id = ?")
        .bind(test_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Tag ids attached to a test, ordered.
pub async fn find_tag_ids<'e, E>(executor: E, test_id: &str) -> Result<Vec<String>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar::<_, String>("SELECT tag_id FROM test_tags WHERE test_id = ? ORDER BY tag_id")
        .bind(test_id)
        .fetch_all(executor)
        .await
}

/// All (test, tag name) pairs of a project, ordered by tag name.
pub async fn find_names_by_project<'e, E>(
    executor: E,
    project_id: &str,
) -> Result<Vec<TestTagName>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, TestTagName>(
        "SELECT tt.test_id, g.name AS tag_name FROM test_tags tt INNER JOIN tests t ON t.id = tt.test_id INNER JOIN tags g ON g.id = tt.tag_id WHERE t.project_id = ? ORDER BY tt.test_id, g.name",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

/// Delete every test-tag link of a project.
pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM test_tags WHERE test_id IN (SELECT id FROM tests WHERE project_id = ?)")
        .bind(project_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
