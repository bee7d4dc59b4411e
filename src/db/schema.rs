//! SQL DDL for initializing the contact-collection storage.
//! SQLite-first design; statements are split on `;` so comments must not contain one.

/// SQLite schema with:
/// - `users.id` taken from the external identity provider (no AUTOINCREMENT)
/// - timestamps stored as RFC3339 TEXT, dates as `YYYY-MM-DD`
/// - booleans stored as INTEGER 0/1
/// - `contacts.questionnaire` a JSON object serialized as text
/// - `search_text` columns holding the searchable fields lowercased by the application
/// - `contact_files` unique per (contact, file)
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    full_name TEXT NOT NULL,
    position TEXT NULL,
    department TEXT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    last_login TEXT NULL,
    search_text TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    format TEXT NOT NULL,
    path TEXT NOT NULL,
    url TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'general',
    size_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exhibitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    preview_file_id INTEGER NULL REFERENCES files(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NULL,
    full_name TEXT NOT NULL,
    position TEXT NOT NULL,
    email TEXT NOT NULL, -- lowercase
    phone_number TEXT NOT NULL,
    city TEXT NULL,
    questionnaire TEXT NOT NULL DEFAULT '{}',
    exhibition_id INTEGER NOT NULL REFERENCES exhibitions(id) ON DELETE CASCADE,
    author_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    is_validated INTEGER NOT NULL DEFAULT 0,
    validated_by_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    validated_at TEXT NULL,
    notes TEXT NULL,
    search_text TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contact_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    file_type TEXT NOT NULL DEFAULT 'other',
    created_at TEXT NOT NULL,
    UNIQUE (contact_id, file_id)
);

CREATE INDEX IF NOT EXISTS idx_exhibitions_active ON exhibitions(is_active);
CREATE INDEX IF NOT EXISTS idx_exhibitions_dates ON exhibitions(start_date, end_date);
CREATE INDEX IF NOT EXISTS idx_contacts_exhibition ON contacts(exhibition_id);
CREATE INDEX IF NOT EXISTS idx_contacts_author ON contacts(author_id);
CREATE INDEX IF NOT EXISTS idx_contacts_email ON contacts(email);
CREATE INDEX IF NOT EXISTS idx_contacts_phone ON contacts(phone_number);
CREATE INDEX IF NOT EXISTS idx_contacts_created ON contacts(created_at);
CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);
CREATE INDEX IF NOT EXISTS idx_contact_files_contact ON contact_files(contact_id)
"#;
