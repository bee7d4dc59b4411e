use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use reqwest::header::COOKIE;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{ExpoError, IsRetryable};
use crate::types::user::{UserProfile, join_name};

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Resolves a session token issued by the intranet into a user identity.
#[derive(Clone)]
pub struct ExternalAuthClient {
    http: reqwest::Client,
    check_url: Url,
    retry_policy: ExponentialBuilder,
}

impl ExternalAuthClient {
    pub fn new(cfg: &AuthConfig) -> Result<Self, ExpoError> {
        let http = reqwest::Client::builder()
            .user_agent("expo-contacts/0.3")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            check_url: cfg.check_url.clone(),
            retry_policy: default_retry_policy(),
        })
    }

    /// `Ok(None)` when the token is unknown to the identity provider.
    pub async fn resolve(&self, session_id: &str) -> Result<Option<UserProfile>, ExpoError> {
        if !is_cookie_safe(session_id) {
            return Ok(None);
        }
        let body = (|| async { self.fetch(session_id).await })
            .retry(self.retry_policy)
            .when(|e: &ExpoError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("auth check retrying after error {}, sleeping {:?}", err, dur);
            })
            .await?;
        Ok(body.as_ref().and_then(parse_identity))
    }

    async fn fetch(&self, session_id: &str) -> Result<Option<Value>, ExpoError> {
        let resp = self
            .http
            .get(self.check_url.clone())
            .header(COOKIE, format!("session_id={session_id}"))
            .send()
            .await?;
        let status = resp.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExpoError::UpstreamStatus(status));
        }
        if !status.is_success() {
            debug!(%status, "auth check rejected session");
            return Ok(None);
        }
        Ok(Some(resp.json::<Value>().await?))
    }
}

fn is_cookie_safe(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\'))
}

fn str_field<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Departments come as a name, a numeric id or a list of either.
fn department_of(v: &Value) -> Option<String> {
    let value = ["UF_DEPARTMENT", "uf_department"]
        .iter()
        .find_map(|k| v.get(*k).filter(|d| !d.is_null()))?;
    let scalar = |d: &Value| match d {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let text = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar(other).unwrap_or_default(),
    };
    (!text.is_empty()).then_some(text)
}

/// Reads `ID`, the name (`full_name` or `fio{LAST_NAME,NAME,SECOND_NAME}`),
/// `WORK_POSITION` and the department from the identity payload.
pub fn parse_identity(v: &Value) -> Option<UserProfile> {
    let id = match v.get("ID")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let full_name = match v.get("fio").filter(|f| f.is_object()) {
        Some(fio) => join_name(
            ["LAST_NAME", "NAME", "SECOND_NAME"].map(|k| fio.get(k).and_then(Value::as_str)),
        ),
        None => None,
    }
    .or_else(|| str_field(v, &["full_name"]).map(str::to_string));

    Some(UserProfile::new(
        id,
        full_name,
        str_field(v, &["WORK_POSITION"]).map(str::to_string),
        department_of(v),
    ))
}
