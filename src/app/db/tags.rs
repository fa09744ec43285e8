use sqlx::FromRow;
use time::OffsetDateTime;

/// Database row for tags table.
#[derive(Debug, Clone, FromRow)]
pub struct Tag {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub color: String,
    pub created_at: i64,
}

/// Data structure for inserting a new tag.
pub struct NewTag {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub color: String,
}

/// Insert a new tag into the database.
pub async fn insert<'e, E>(executor: E, tag: &NewTag) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = OffsetDateTime::now_utc().unix_timestamp();

    sqlx::query("INSERT INTO tags (id, project_id, name, color, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&tag.id)
        .bind(&tag.project_id)
        .bind(&tag.name)
        .bind(&tag.color)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(())
}

/// Find all tags for a project, ordered by name.
pub async fn find_by_project<'e, E>(executor: E, project_id: &str) -> Result<Vec<Tag>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, Tag>(
        "SELECT id, project_id, name, color, created_at FROM tags WHERE project_id = ? ORDER BY name, id",
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

/// Update a tag's color.
pub async fn update_color<'e, E>(executor: E, id: &str, color: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("UPDATE tags SET color = ? WHERE id = ?")
        .bind(color)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Delete every tag of a project.
pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM tags WHERE project_id = ?")
        .bind(project_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
