use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use super::files::insert_file;
use super::models::{ContactFileType, DbContact, DbContactFile, DbFile};
use super::sqlite::{ExpoStorage, search_pattern, search_text};
use crate::error::ExpoError;
use crate::types::contact::{
    BatchOutcome, ContactCreate, ContactListItem, ContactListQuery, ContactStats,
    DuplicateProbe, NamedCount, SkippedContact, duplicate_fields,
};
use crate::types::file::StoredFile;
use crate::types::{Page, Pagination};

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Contacts sharing the probe's email or raw phone, optionally scoped to one exhibition.
pub(crate) async fn find_duplicates(
    conn: &mut SqliteConnection,
    probe: &DuplicateProbe,
    exhibition_id: Option<i64>,
    exclude_id: Option<i64>,
) -> Result<Vec<DbContact>, ExpoError> {
    if probe.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM contacts WHERE (");
    let mut sep = qb.separated(" OR ");
    if let Some(email) = probe.email.clone().filter(|e| !e.is_empty()) {
        sep.push("email = ").push_bind_unseparated(email);
    }
    if let Some(phone) = probe.phone_number.clone().filter(|p| !p.is_empty()) {
        sep.push("phone_number = ").push_bind_unseparated(phone);
    }
    qb.push(")");
    if let Some(exhibition_id) = exhibition_id {
        qb.push(" AND exhibition_id = ").push_bind(exhibition_id);
    }
    if let Some(exclude_id) = exclude_id {
        qb.push(" AND id != ").push_bind(exclude_id);
    }
    qb.push(" ORDER BY id");
    let rows = qb.build_query_as::<DbContact>().fetch_all(conn).await?;
    Ok(rows)
}

async fn insert_contact(
    conn: &mut SqliteConnection,
    c: &ContactCreate,
    exhibition_id: i64,
    author_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<DbContact, ExpoError> {
    let contact = sqlx::query_as::<_, DbContact>(
        r#"
        INSERT INTO contacts (
            title, description, full_name, position, email, phone_number, city,
            questionnaire, exhibition_id, author_id, is_validated, search_text,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&c.title)
    .bind(&c.description)
    .bind(&c.full_name)
    .bind(&c.position)
    .bind(&c.email)
    .bind(&c.phone_number)
    .bind(&c.city)
    .bind(Json(&c.questionnaire))
    .bind(exhibition_id)
    .bind(author_id)
    .bind(search_text([
        Some(c.title.as_str()),
        Some(c.full_name.as_str()),
        Some(c.position.as_str()),
        Some(c.email.as_str()),
        Some(c.phone_number.as_str()),
        c.description.as_deref(),
        c.city.as_deref(),
    ]))
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(contact)
}

async fn count_links(conn: &mut SqliteConnection, contact_id: i64) -> Result<i64, ExpoError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_files WHERE contact_id = ?")
        .bind(contact_id)
        .fetch_one(conn)
        .await?;
    Ok(n)
}

fn push_contact_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    q: &ContactListQuery,
    author_id: Option<i64>,
) {
    if let Some(author_id) = author_id {
        qb.push(" AND c.author_id = ").push_bind(author_id);
    }
    if let Some(exhibition_id) = q.exhibition_id {
        qb.push(" AND c.exhibition_id = ").push_bind(exhibition_id);
    }
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND c.search_text LIKE ")
            .push_bind(search_pattern(search));
    }
    if let Some(from) = q.date_from {
        qb.push(" AND c.created_at >= ").push_bind(start_of(from));
    }
    if let Some(to) = q.date_to.and_then(|d| d.checked_add_days(Days::new(1))) {
        qb.push(" AND c.created_at < ").push_bind(start_of(to));
    }
}

/// Appends `WHERE exhibition_id = ?` style scoping to a stats query.
fn scope(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, exhibition_id: Option<i64>) {
    if let Some(id) = exhibition_id {
        qb.push(format!(" AND {column} = ")).push_bind(id);
    }
}

impl ExpoStorage {
    /// Duplicate check and insert run in one transaction.
    pub async fn create_contact(
        &self,
        c: &ContactCreate,
        exhibition_id: i64,
        author_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<DbContact, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let probe = c.probe();
        let matches = find_duplicates(&mut tx, &probe, Some(exhibition_id), None).await?;
        let fields = duplicate_fields(&probe, &matches);
        if !fields.is_empty() {
            return Err(ExpoError::DuplicateContact(fields));
        }
        let contact = insert_contact(&mut tx, c, exhibition_id, author_id, now).await?;
        tx.commit().await?;
        info!(id = contact.id, exhibition_id, "contact created");
        Ok(contact)
    }

    /// Rows duplicating stored contacts or earlier rows of the same batch are skipped.
    pub async fn create_contacts_batch(
        &self,
        exhibition_id: i64,
        contacts: &[ContactCreate],
        author_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = BatchOutcome {
            created: Vec::new(),
            skipped: Vec::new(),
        };
        for (index, c) in contacts.iter().enumerate() {
            let probe = c.probe();
            let matches = find_duplicates(&mut tx, &probe, Some(exhibition_id), None).await?;
            let fields = duplicate_fields(&probe, &matches);
            if !fields.is_empty() {
                debug!(index, ?fields, "batch row skipped as duplicate");
                outcome.skipped.push(SkippedContact {
                    index,
                    email: c.email.clone(),
                    phone_number: c.phone_number.clone(),
                    duplicate_fields: fields,
                });
                continue;
            }
            let contact = insert_contact(&mut tx, c, exhibition_id, author_id, now).await?;
            outcome.created.push(contact);
        }
        tx.commit().await?;
        info!(
            exhibition_id,
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            "contact batch stored"
        );
        Ok(outcome)
    }

    pub async fn get_contact(&self, id: i64) -> Result<Option<DbContact>, ExpoError> {
        let c = sqlx::query_as::<_, DbContact>("SELECT * FROM contacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(c)
    }

    pub async fn find_duplicates(
        &self,
        probe: &DuplicateProbe,
        exhibition_id: Option<i64>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<DbContact>, ExpoError> {
        let mut conn = self.pool.acquire().await?;
        find_duplicates(&mut conn, probe, exhibition_id, exclude_id).await
    }

    pub async fn contacts_for_exhibition(
        &self,
        exhibition_id: i64,
    ) -> Result<Vec<DbContact>, ExpoError> {
        let rows = sqlx::query_as::<_, DbContact>(
            "SELECT * FROM contacts WHERE exhibition_id = ? ORDER BY created_at, id",
        )
        .bind(exhibition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Writes every mutable column after checking `probe` for duplicates in the
    /// contact's exhibition, excluding the contact itself.
    pub async fn save_contact(
        &self,
        c: &DbContact,
        probe: &DuplicateProbe,
    ) -> Result<DbContact, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let matches = find_duplicates(&mut tx, probe, Some(c.exhibition_id), Some(c.id)).await?;
        let fields = duplicate_fields(probe, &matches);
        if !fields.is_empty() {
            return Err(ExpoError::DuplicateContact(fields));
        }
        let saved = sqlx::query_as::<_, DbContact>(
            r#"UPDATE contacts SET
                title = ?,
                description = ?,
                full_name = ?,
                position = ?,
                email = ?,
                phone_number = ?,
                city = ?,
                questionnaire = ?,
                exhibition_id = ?,
                is_validated = ?,
                validated_by_id = ?,
                validated_at = ?,
                notes = ?,
                search_text = ?,
                updated_at = ?
              WHERE id = ?
              RETURNING *"#,
        )
        .bind(&c.title)
        .bind(&c.description)
        .bind(&c.full_name)
        .bind(&c.position)
        .bind(&c.email)
        .bind(&c.phone_number)
        .bind(&c.city)
        .bind(&c.questionnaire)
        .bind(c.exhibition_id)
        .bind(c.is_validated)
        .bind(c.validated_by_id)
        .bind(c.validated_at)
        .bind(&c.notes)
        .bind(search_text([
            Some(c.title.as_str()),
            Some(c.full_name.as_str()),
            Some(c.position.as_str()),
            Some(c.email.as_str()),
            Some(c.phone_number.as_str()),
            c.description.as_deref(),
            c.city.as_deref(),
        ]))
        .bind(c.updated_at)
        .bind(c.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ExpoError::NotFound("Contact"))?;
        tx.commit().await?;
        Ok(saved)
    }

    /// Newest first. `author_id` restricts the listing to one author's contacts.
    pub async fn list_contacts(
        &self,
        q: &ContactListQuery,
        author_id: Option<i64>,
        window: Pagination,
    ) -> Result<Page<ContactListItem>, ExpoError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM contacts c WHERE 1=1");
        push_contact_filters(&mut count, q, author_id);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            r#"SELECT c.id, c.title, c.full_name, c.position, c.email, c.phone_number,
                      c.city, c.exhibition_id, e.title AS exhibition_title,
                      c.is_validated, c.created_at
               FROM contacts c LEFT JOIN exhibitions e ON e.id = c.exhibition_id
               WHERE 1=1"#,
        );
        push_contact_filters(&mut select, q, author_id);
        select
            .push(" ORDER BY c.created_at DESC, c.id DESC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.skip);
        let items = select
            .build_query_as::<ContactListItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(total, window, items))
    }

    /// Deletes the contact and its attached file rows. Returns the files so the
    /// caller can remove them from disk.
    pub async fn delete_contact(&self, id: i64) -> Result<Option<Vec<DbContactFile>>, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let files = contact_files(&mut tx, id).await?;
        for f in &files {
            sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(f.file_id)
                .execute(&mut *tx)
                .await?;
        }
        let done = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if done.rows_affected() == 0 {
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(files))
    }

    pub async fn count_contact_files(&self, contact_id: i64) -> Result<i64, ExpoError> {
        let mut conn = self.pool.acquire().await?;
        count_links(&mut conn, contact_id).await
    }

    /// Records stored files and links them to the contact, refusing to exceed `max_files`.
    pub async fn attach_files(
        &self,
        contact_id: i64,
        stored: &[(StoredFile, ContactFileType)],
        max_files: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<(DbFile, ContactFileType)>, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let current = count_links(&mut tx, contact_id).await?;
        if current + stored.len() as i64 > max_files {
            return Err(too_many_files(max_files));
        }
        let mut attached = Vec::with_capacity(stored.len());
        for (f, file_type) in stored {
            let file = insert_file(&mut tx, f, now).await?;
            sqlx::query(
                "INSERT INTO contact_files (contact_id, file_id, file_type, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(contact_id)
            .bind(file.id)
            .bind(*file_type)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            attached.push((file, *file_type));
        }
        tx.commit().await?;
        Ok(attached)
    }

    pub async fn contact_files(&self, contact_id: i64) -> Result<Vec<DbContactFile>, ExpoError> {
        let mut conn = self.pool.acquire().await?;
        contact_files(&mut conn, contact_id).await
    }

    /// Removes the link and the file row. `None` when the file is not attached to the contact.
    pub async fn detach_contact_file(
        &self,
        contact_id: i64,
        file_id: i64,
    ) -> Result<Option<DbContactFile>, ExpoError> {
        let mut tx = self.pool.begin().await?;
        let link = sqlx::query_as::<_, DbContactFile>(
            r#"SELECT f.id AS file_id, f.name, l.file_type, f.url, f.format, f.path, l.created_at
               FROM contact_files l JOIN files f ON f.id = l.file_id
               WHERE l.contact_id = ? AND l.file_id = ?"#,
        )
        .bind(contact_id)
        .bind(file_id)
        .fetch_optional(&mut *tx)
        .await?;
        if link.is_some() {
            sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(file_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(link)
    }

    pub async fn contact_stats(
        &self,
        exhibition_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ContactStats, ExpoError> {
        let count_since = |since: Option<DateTime<Utc>>| {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM contacts WHERE 1=1");
            scope(&mut qb, "exhibition_id", exhibition_id);
            if let Some(since) = since {
                qb.push(" AND created_at >= ").push_bind(since);
            }
            qb
        };

        let total: i64 = count_since(None)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let week_ago = now - chrono::Duration::days(7);
        let contacts_last_week: i64 = count_since(Some(week_ago))
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let contacts_today: i64 = count_since(Some(start_of(now.date_naive())))
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut by_exhibition = QueryBuilder::<Sqlite>::new(
            r#"SELECT e.title AS name, COUNT(c.id) AS count
               FROM exhibitions e JOIN contacts c ON c.exhibition_id = e.id
               WHERE 1=1"#,
        );
        scope(&mut by_exhibition, "e.id", exhibition_id);
        by_exhibition.push(" GROUP BY e.id, e.title ORDER BY count DESC, e.id");
        let contacts_by_exhibition = by_exhibition
            .build_query_as::<NamedCount>()
            .fetch_all(&self.pool)
            .await?;

        let mut by_position = QueryBuilder::<Sqlite>::new(
            "SELECT position AS name, COUNT(*) AS count FROM contacts WHERE position != ''",
        );
        scope(&mut by_position, "exhibition_id", exhibition_id);
        by_position.push(" GROUP BY position ORDER BY count DESC, position LIMIT 10");
        let contacts_by_position = by_position
            .build_query_as::<NamedCount>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ContactStats {
            total_contacts: total,
            contacts_by_exhibition,
            contacts_by_position,
            contacts_last_week,
            contacts_today,
        })
    }
}

async fn contact_files(
    conn: &mut SqliteConnection,
    contact_id: i64,
) -> Result<Vec<DbContactFile>, ExpoError> {
    let rows = sqlx::query_as::<_, DbContactFile>(
        r#"SELECT f.id AS file_id, f.name, l.file_type, f.url, f.format, f.path, l.created_at
           FROM contact_files l JOIN files f ON f.id = l.file_id
           WHERE l.contact_id = ?
           ORDER BY l.id"#,
    )
    .bind(contact_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub(crate) fn too_many_files(max_files: i64) -> ExpoError {
    ExpoError::Validation(format!(
        "Maximum number of files per contact: {max_files}"
    ))
}
