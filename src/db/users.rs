use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::models::DbUser;
use super::sqlite::{ExpoStorage, search_pattern, search_text};
use crate::error::ExpoError;
use crate::types::user::{UserListQuery, UserProfile};
use crate::types::{Page, Pagination};

fn user_search_text(full_name: &str, position: Option<&str>, department: Option<&str>) -> String {
    search_text([Some(full_name), position, department])
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Sqlite>, q: &UserListQuery) {
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND search_text LIKE ")
            .push_bind(search_pattern(search));
    }
    if let Some(is_admin) = q.is_admin {
        qb.push(" AND is_admin = ").push_bind(is_admin);
    }
}

impl ExpoStorage {
    /// Insert or refresh a user on login. New users are never admins.
    pub async fn upsert_login(
        &self,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<DbUser, ExpoError> {
        let user = sqlx::query_as::<_, DbUser>(
            r#"
            INSERT INTO users (
                id, full_name, position, department, is_admin,
                last_login, search_text, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name=excluded.full_name,
                position=excluded.position,
                department=excluded.department,
                last_login=excluded.last_login,
                search_text=excluded.search_text,
                updated_at=excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.position)
        .bind(&profile.department)
        .bind(now)
        .bind(user_search_text(
            &profile.full_name,
            profile.position.as_deref(),
            profile.department.as_deref(),
        ))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<DbUser>, ExpoError> {
        let user = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Newest first.
    pub async fn list_users(
        &self,
        q: &UserListQuery,
        window: Pagination,
    ) -> Result<Page<DbUser>, ExpoError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_user_filters(&mut count, q);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE 1=1");
        push_user_filters(&mut select, q);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.skip);
        let items = select
            .build_query_as::<DbUser>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(total, window, items))
    }

    pub async fn save_user(&self, user: &DbUser) -> Result<(), ExpoError> {
        sqlx::query(
            r#"UPDATE users SET
                full_name = ?,
                position = ?,
                department = ?,
                is_admin = ?,
                search_text = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&user.full_name)
        .bind(&user.position)
        .bind(&user.department)
        .bind(user.is_admin)
        .bind(user_search_text(
            &user.full_name,
            user.position.as_deref(),
            user.department.as_deref(),
        ))
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, ExpoError> {
        let done = sqlx::query("UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, ExpoError> {
        let done = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
