use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use super::files::insert_file;
use super::models::{DbExhibition, DbFile, DbUser};
use super::sqlite::ExpoStorage;
use crate::error::ExpoError;
use crate::types::exhibition::{ExhibitionCreate, ExhibitionListQuery, ExhibitionSort};
use crate::types::file::StoredFile;
use crate::types::{Page, Pagination};

async fn deactivate_others(
    conn: &mut SqliteConnection,
    keep_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<u64, ExpoError> {
    let done = sqlx::query(
        "UPDATE exhibitions SET is_active = 0, updated_at = ? WHERE is_active = 1 AND id != ?",
    )
    .bind(now)
    .bind(keep_id.unwrap_or(-1))
    .execute(conn)
    .await?;
    Ok(done.rows_affected())
}

fn push_exhibition_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    q: &ExhibitionListQuery,
    viewer: &DbUser,
    today: NaiveDate,
) {
    if q.active_only {
        qb.push(" AND start_date <= ")
            .push_bind(today)
            .push(" AND end_date >= ")
            .push_bind(today);
    }
    if !viewer.is_admin {
        qb.push(
            " AND (is_active = 1 OR id IN (SELECT DISTINCT exhibition_id FROM contacts WHERE author_id = ",
        )
        .push_bind(viewer.id)
        .push("))");
    }
}

impl ExpoStorage {
    /// An active exhibition takes the flag from every other one in the same transaction.
    pub async fn create_exhibition(
        &self,
        input: &ExhibitionCreate,
        now: DateTime<Utc>,
    ) -> Result<DbExhibition, ExpoError> {
        let mut tx = self.pool.begin().await?;
        if input.is_active {
            deactivate_others(&mut tx, None, now).await?;
        }
        let ex = sqlx::query_as::<_, DbExhibition>(
            r#"
            INSERT INTO exhibitions (
                title, description, is_active, start_date, end_date,
                preview_file_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.is_active)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.preview_file_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(ex)
    }

    pub async fn get_exhibition(&self, id: i64) -> Result<Option<DbExhibition>, ExpoError> {
        let ex = sqlx::query_as::<_, DbExhibition>("SELECT * FROM exhibitions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ex)
    }

    /// The exhibition new contacts default to. When several rows carry the flag
    /// the most recently updated one wins.
    pub async fn active_exhibition(&self) -> Result<Option<DbExhibition>, ExpoError> {
        let ex = sqlx::query_as::<_, DbExhibition>(
            "SELECT * FROM exhibitions WHERE is_active = 1 ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(ex)
    }

    pub async fn list_exhibitions(
        &self,
        q: &ExhibitionListQuery,
        viewer: &DbUser,
        today: NaiveDate,
        window: Pagination,
    ) -> Result<Page<DbExhibition>, ExpoError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM exhibitions WHERE 1=1");
        push_exhibition_filters(&mut count, q, viewer, today);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let column = ExhibitionSort::parse(q.sort_by.as_deref()).column();
        let direction = if q.sort_desc { "DESC" } else { "ASC" };
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM exhibitions WHERE 1=1");
        push_exhibition_filters(&mut select, q, viewer, today);
        select
            .push(format!(
                " ORDER BY {column} {direction}, id {direction} LIMIT "
            ))
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.skip);
        let items = select
            .build_query_as::<DbExhibition>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(total, window, items))
    }

    pub async fn save_exhibition(&self, ex: &DbExhibition) -> Result<(), ExpoError> {
        sqlx::query(
            r#"UPDATE exhibitions SET
                title = ?,
                description = ?,
                start_date = ?,
                end_date = ?,
                preview_file_id = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&ex.title)
        .bind(&ex.description)
        .bind(ex.start_date)
        .bind(ex.end_date)
        .bind(ex.preview_file_id)
        .bind(ex.updated_at)
        .bind(ex.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Makes `id` the only active exhibition. `None` when it does not exist.
    pub async fn activate_exhibition(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<DbExhibition>, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let ex = sqlx::query_as::<_, DbExhibition>(
            "UPDATE exhibitions SET is_active = 1, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(ex) = ex else {
            return Ok(None);
        };
        let cleared = deactivate_others(&mut tx, Some(id), now).await?;
        tx.commit().await?;
        info!(id, cleared, "exhibition activated");
        Ok(Some(ex))
    }

    /// Contacts cascade; their files stay on disk.
    pub async fn delete_exhibition(&self, id: i64) -> Result<bool, ExpoError> {
        let done = sqlx::query("DELETE FROM exhibitions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Records the uploaded preview and points the exhibition at it.
    pub async fn set_exhibition_preview(
        &self,
        id: i64,
        stored: &StoredFile,
        now: DateTime<Utc>,
    ) -> Result<(DbExhibition, DbFile), ExpoError> {
        let mut tx = self.pool.begin().await?;
        let file = insert_file(&mut tx, stored, now).await?;
        let ex = sqlx::query_as::<_, DbExhibition>(
            "UPDATE exhibitions SET preview_file_id = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(file.id)
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ExpoError::NotFound("Exhibition"))?;
        tx.commit().await?;
        Ok((ex, file))
    }
}
