use axum::extract::multipart::Field;
use chrono::Utc;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::ExpoError;
use crate::types::file::StoredFile;

const MIB: u64 = 1024 * 1024;

static UPLOAD_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{1,32}$").expect("valid upload dir regex"));
static UNSAFE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w-]+").expect("valid file name regex"));

/// Extension allow-list and size cap for one kind of upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    pub allowed: &'static [&'static str],
    pub max_bytes: u64,
}

impl UploadRules {
    pub const CONTACT_FILES: UploadRules = UploadRules {
        allowed: &["jpg", "jpeg", "png", "pdf", "doc", "docx", "txt"],
        max_bytes: 5 * MIB,
    };

    pub const EXHIBITION_PREVIEW: UploadRules = UploadRules {
        allowed: &["jpg", "jpeg", "png", "gif", "webp"],
        max_bytes: 10 * MIB,
    };

    pub const BUSINESS_CARD: UploadRules = UploadRules {
        allowed: &["jpg", "jpeg", "png", "gif", "webp", "bmp"],
        max_bytes: 5 * MIB,
    };

    pub const OCR_IMAGE: UploadRules = UploadRules {
        allowed: &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"],
        max_bytes: 10 * MIB,
    };

    pub const GENERAL: UploadRules = UploadRules {
        allowed: &[
            "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "svg", "pdf", "doc", "docx", "xls",
            "xlsx", "ppt", "pptx", "txt", "rtf", "zip", "rar", "7z", "csv", "json", "xml",
        ],
        max_bytes: 100 * MIB,
    };

    pub fn max_mb(&self) -> u64 {
        self.max_bytes / MIB
    }

    /// Lowercased extension of `file_name`, if it is on the allow-list.
    pub fn check_name(&self, file_name: &str) -> Result<String, ExpoError> {
        let ext = extension_of(file_name);
        if self.allowed.contains(&ext.as_str()) {
            Ok(ext)
        } else {
            Err(ExpoError::UnsupportedFileType(self.allowed.join(", ")))
        }
    }
}

/// How the on-disk name of an upload is chosen.
#[derive(Debug, Clone)]
pub enum Naming {
    /// `{timestamp}_{uuid8}_{original stem}.{ext}`
    Unique,
    /// `{prefix}_{timestamp}_{uuid8}.{ext}`
    Prefixed(String),
    /// Caller-chosen stem; an existing file with the same name is replaced.
    Custom(String),
}

impl Naming {
    fn file_name(&self, original: &str, ext: &str) -> String {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let short = Uuid::new_v4().simple().to_string();
        let short = &short[..8];
        let stem = match self {
            Naming::Unique => format!("{stamp}_{short}_{}", safe_stem(original)),
            Naming::Prefixed(prefix) => format!("{}_{stamp}_{short}", safe_stem(prefix)),
            Naming::Custom(name) => safe_stem(name),
        };
        format!("{stem}.{ext}")
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn safe_stem(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let cleaned = UNSAFE_NAME_RE.replace_all(stem, "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(80).collect()
    }
}

/// Writes uploads under `root/{dir}` and serves them at `url_prefix/{dir}`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    url_prefix: String,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &UploadConfig) -> Self {
        Self::new(cfg.root_dir.clone(), cfg.url_prefix.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Streams one multipart field to disk.
    ///
    /// The extension is checked before anything is written. The body lands in a
    /// `.part` sibling that replaces the target only once it is complete, so a
    /// body over `rules.max_bytes` or a broken stream leaves any file already
    /// stored under that name untouched.
    pub async fn save_field(
        &self,
        mut field: Field<'_>,
        dir: &str,
        rules: &UploadRules,
        naming: &Naming,
    ) -> Result<StoredFile, ExpoError> {
        let original = field.file_name().unwrap_or("upload").to_string();
        let ext = rules.check_name(&original)?;
        if !UPLOAD_DIR_RE.is_match(dir) {
            return Err(ExpoError::Validation(format!("invalid file type '{dir}'")));
        }

        let target_dir = self.root.join(dir);
        fs::create_dir_all(&target_dir).await?;
        let file_name = naming.file_name(&original, &ext);
        let path = target_dir.join(&file_name);
        let part = target_dir.join(format!(".{file_name}.part-{}", Uuid::new_v4().simple()));

        let mut out = fs::File::create(&part).await?;
        let copied = copy_limited(&mut field, &mut out, rules).await;
        drop(out);
        let size = match copied {
            Ok(size) => size,
            Err(e) => {
                discard_part(&part).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&part, &path).await {
            discard_part(&part).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), size, "upload stored");

        Ok(StoredFile {
            name: original,
            format: ext,
            path: path.to_string_lossy().into_owned(),
            url: format!("{}/{dir}/{file_name}", self.url_prefix),
            kind: dir.to_string(),
            size_bytes: i64::try_from(size).unwrap_or(i64::MAX),
        })
    }
}

async fn discard_part(part: &Path) {
    if let Err(e) = fs::remove_file(part).await {
        warn!(path = %part.display(), error = %e, "failed to remove partial upload");
    }
}

async fn copy_limited(
    field: &mut Field<'_>,
    out: &mut fs::File,
    rules: &UploadRules,
) -> Result<u64, ExpoError> {
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > rules.max_bytes {
            return Err(ExpoError::FileTooLarge {
                max_mb: rules.max_mb(),
            });
        }
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(written)
}

/// Buffers one field in memory, for content that is processed and never stored.
pub async fn read_field_limited(
    mut field: Field<'_>,
    rules: &UploadRules,
) -> Result<Vec<u8>, ExpoError> {
    if let Some(name) = field.file_name() {
        rules.check_name(name)?;
    }
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if (buf.len() + chunk.len()) as u64 > rules.max_bytes {
            return Err(ExpoError::FileTooLarge {
                max_mb: rules.max_mb(),
            });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// `Ok(false)` when the file was already gone.
pub async fn remove_from_disk(path: &str) -> Result<bool, ExpoError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Best-effort cleanup after the rows are gone.
pub async fn remove_all_from_disk(paths: Vec<String>) {
    for path in paths {
        if let Err(e) = remove_from_disk(&path).await {
            warn!(path = %path, error = %e, "failed to remove stored file");
        }
    }
}
