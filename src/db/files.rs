use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::models::DbFile;
use super::sqlite::ExpoStorage;
use crate::error::ExpoError;
use crate::types::file::StoredFile;
use crate::types::{Page, Pagination};

pub(crate) async fn insert_file(
    conn: &mut SqliteConnection,
    f: &StoredFile,
    now: DateTime<Utc>,
) -> Result<DbFile, ExpoError> {
    let file = sqlx::query_as::<_, DbFile>(
        r#"
        INSERT INTO files (name, format, path, url, kind, size_bytes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&f.name)
    .bind(&f.format)
    .bind(&f.path)
    .bind(&f.url)
    .bind(&f.kind)
    .bind(f.size_bytes)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(file)
}

fn push_file_filters(qb: &mut QueryBuilder<'_, Sqlite>, format_filter: Option<&str>) {
    if let Some(format) = format_filter.map(str::trim).filter(|f| !f.is_empty()) {
        qb.push(" AND format LIKE ").push_bind(format!("%{format}%"));
    }
}

impl ExpoStorage {
    /// A row already pointing at the same stored path is kept and refreshed to
    /// describe the new content.
    pub async fn record_file(
        &self,
        stored: &StoredFile,
        now: DateTime<Utc>,
    ) -> Result<DbFile, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM files WHERE path = ? ORDER BY id LIMIT 1")
                .bind(&stored.path)
                .fetch_optional(&mut *tx)
                .await?;
        let file = match existing {
            Some(id) => {
                sqlx::query_as::<_, DbFile>(
                    r#"UPDATE files SET
                        name = ?,
                        format = ?,
                        url = ?,
                        kind = ?,
                        size_bytes = ?,
                        updated_at = ?
                      WHERE id = ?
                      RETURNING *"#,
                )
                .bind(&stored.name)
                .bind(&stored.format)
                .bind(&stored.url)
                .bind(&stored.kind)
                .bind(stored.size_bytes)
                .bind(now)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => insert_file(&mut tx, stored, now).await?,
        };
        tx.commit().await?;
        Ok(file)
    }

    pub async fn get_file(&self, id: i64) -> Result<Option<DbFile>, ExpoError> {
        let file = sqlx::query_as::<_, DbFile>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    /// Newest first.
    pub async fn list_files(
        &self,
        format_filter: Option<&str>,
        window: Pagination,
    ) -> Result<Page<DbFile>, ExpoError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM files WHERE 1=1");
        push_file_filters(&mut count, format_filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM files WHERE 1=1");
        push_file_filters(&mut select, format_filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.skip);
        let items = select
            .build_query_as::<DbFile>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(total, window, items))
    }

    /// Contact links cascade; exhibition previews are cleared.
    pub async fn delete_file_row(&self, id: i64) -> Result<bool, ExpoError> {
        let done = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
