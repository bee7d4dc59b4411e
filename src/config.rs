use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

/// Process-wide configuration, loaded once from defaults, `config.toml` and `EXPO_*` env.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::figment()
        .extract()
        .expect("FATAL: invalid configuration")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub basic: BasicConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    /// Questionnaire pattern served to the contact form; bundled pattern when unset.
    #[serde(default)]
    pub questionnaire_path: Option<PathBuf>,
}

impl Config {
    /// Defaults <- `config.toml` <- `EXPO_` env (`__` separates sections).
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("EXPO_").split("__"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// At least 64 bytes; a random key is generated when empty.
    pub cookie_secret: String,
    pub insecure_cookie: bool,
    pub login_redirect_url: String,
    pub cors_allow_origin: Option<String>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:data/expo.sqlite".to_string(),
            loglevel: "info".to_string(),
            cookie_secret: String::new(),
            insecure_cookie: false,
            login_redirect_url: "/users/me".to_string(),
            cors_allow_origin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub check_url: Url,
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            check_url: Url::parse("http://127.0.0.1:9000/api/auth_router/check")
                .expect("static url"),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub root_dir: PathBuf,
    pub url_prefix: String,
    /// Hard cap on any request body; per-endpoint file limits are lower.
    pub max_request_bytes: usize,
    pub max_files_per_contact: i64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("uploads"),
            url_prefix: "/uploads".to_string(),
            max_request_bytes: 110 * 1024 * 1024,
            max_files_per_contact: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tesseract_bin: PathBuf,
    pub languages: String,
    pub whitelist: String,
    pub psm: u8,
    pub enhanced_psms: Vec<u8>,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: PathBuf::from("tesseract"),
            languages: "rus+eng".to_string(),
            whitelist: concat!(
                "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",
                "АБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯабвгдеёжзийклмнопрстуфхцчшщъыьэюя",
                "0123456789@.,:;+-()/_&'\"#№ "
            )
            .to_string(),
            psm: 6,
            enhanced_psms: vec![6, 4, 3, 11],
            timeout_secs: 30,
            requests_per_minute: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_extract_through_figment() {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .extract()
            .expect("defaults should extract");
        assert_eq!(cfg.basic.listen_addr, "0.0.0.0:8000");
        assert_eq!(cfg.ocr.psm, 6);
        assert_eq!(cfg.uploads.max_files_per_contact, 3);
    }

    #[test]
    fn nested_values_override_defaults() {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("[ocr]\npsm = 4\n[basic]\ninsecure_cookie = true\n"))
            .extract()
            .expect("override should extract");
        assert_eq!(cfg.ocr.psm, 4);
        assert!(cfg.basic.insecure_cookie);
        assert_eq!(cfg.ocr.languages, "rus+eng");
    }
}
