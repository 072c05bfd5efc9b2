//! OneMap token lifecycle.
//!
//! The token file holds the raw auth response, at minimum
//! `{"access_token": ..., "expiry_timestamp": ...}` with the expiry in epoch
//! seconds. A token expiring within the margin is deleted and re-fetched.

use super::{number_field, text_field};
use crate::config::GeoConfig;
use crate::geo::throttle::Throttle;
use crate::geo::types::{GeoError, Result};
use log::{debug, info, warn};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// An access token with its expiry in epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub access_token: String,
    pub expiry: f64,
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp() as f64
}

pub struct OneMapAuth {
    auth_url: String,
    credentials_path: PathBuf,
    token_path: PathBuf,
    margin_secs: u64,
}

impl OneMapAuth {
    pub fn new(
        auth_url: impl Into<String>,
        credentials_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
        margin_secs: u64,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            margin_secs,
        }
    }

    pub fn from_config(config: &GeoConfig) -> Self {
        Self::new(
            config.onemap.auth_url.clone(),
            config.credentials_path(),
            config.token_path(),
            config.token_margin_secs,
        )
    }

    /// Whether `token` is still usable at `now`, keeping the safety margin.
    pub fn is_fresh(&self, token: &Token, now: f64) -> bool {
        token.expiry > now + self.margin_secs as f64
    }

    /// Whether `token` is still usable right now.
    pub fn is_fresh_now(&self, token: &Token) -> bool {
        self.is_fresh(token, now_secs())
    }

    /// A valid access token, from the token file or a fresh login.
    pub fn get_token(&self, agent: &ureq::Agent, throttle: &Throttle) -> Result<Token> {
        if let Some(token) = self.stored_token(now_secs())? {
            return Ok(token);
        }

        let credentials = self.read_credentials()?;
        info!("Requesting a new OneMap token");
        throttle.wait();
        let response = agent
            .post(&self.auth_url)
            .set("cache-control", "no-cache")
            .send_json(credentials);
        let body: Value = match response {
            Ok(r) => serde_json::from_str(&r.into_string()?)
                .map_err(|e| GeoError::Authentication(format!("unreadable token response: {}", e)))?,
            Err(ureq::Error::Status(code, _)) => {
                return Err(GeoError::Authentication(format!("token request rejected with status {}", code)))
            }
            Err(e) => return Err(e.into()),
        };
        self.store_token(&body)
    }

    fn read_credentials(&self) -> Result<Value> {
        let raw = fs::read_to_string(&self.credentials_path).map_err(|e| {
            GeoError::Authentication(format!(
                "cannot read credentials {}: {}",
                self.credentials_path.display(),
                e
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            GeoError::Authentication(format!(
                "invalid credentials {}: {}",
                self.credentials_path.display(),
                e
            ))
        })
    }

    /// The stored token if it is still good at `now` (epoch seconds).
    /// Stale or unreadable token files are removed.
    fn stored_token(&self, now: f64) -> Result<Option<Token>> {
        let raw = match fs::read_to_string(&self.token_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed = serde_json::from_str::<Value>(&raw).ok().and_then(|v| parse_token(&v));

        match parsed {
            Some(token) if self.is_fresh(&token, now) => {
                debug!("Reusing OneMap token valid until {}", token.expiry);
                Ok(Some(token))
            }
            Some(_) => {
                debug!("OneMap token expires within {}s, discarding", self.margin_secs);
                fs::remove_file(&self.token_path)?;
                Ok(None)
            }
            None => {
                warn!("Discarding unreadable token file {}", self.token_path.display());
                fs::remove_file(&self.token_path)?;
                Ok(None)
            }
        }
    }

    /// Persist a token response and return its token.
    fn store_token(&self, body: &Value) -> Result<Token> {
        if body.get("access_token").and_then(Value::as_str).is_none() {
            return Err(GeoError::Authentication("Error in authentication!".into()));
        }
        let token = parse_token(body)
            .ok_or_else(|| GeoError::Authentication("token response has no expiry_timestamp".into()))?;
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.token_path, serde_json::to_string(body)?)?;
        Ok(token)
    }
}

fn parse_token(value: &Value) -> Option<Token> {
    Some(Token {
        access_token: text_field(value.get("access_token"))?,
        expiry: number_field(value.get("expiry_timestamp"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_auth(dir: &TempDir) -> OneMapAuth {
        OneMapAuth::new(
            "http://127.0.0.1:1/getToken",
            dir.path().join("OneMap.key"),
            dir.path().join("OneMapToken.key"),
            600,
        )
    }

    #[test]
    fn test_no_token_file() {
        let dir = TempDir::new().unwrap();
        assert!(test_auth(&dir).stored_token(1_000.0).unwrap().is_none());
    }

    #[test]
    fn test_fresh_token_reused() {
        let dir = TempDir::new().unwrap();
        let auth = test_auth(&dir);
        auth.store_token(&json!({"access_token": "abc", "expiry_timestamp": 10_000})).unwrap();

        let token = auth.stored_token(1_000.0).unwrap().unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expiry, 10_000.0);
        assert!(dir.path().join("OneMapToken.key").exists());
    }

    #[test]
    fn test_token_within_margin_discarded() {
        let dir = TempDir::new().unwrap();
        let auth = test_auth(&dir);
        auth.store_token(&json!({"access_token": "abc", "expiry_timestamp": "1500"})).unwrap();

        // 1500 <= 1000 + 600
        assert!(auth.stored_token(1_000.0).unwrap().is_none());
        assert!(!dir.path().join("OneMapToken.key").exists());
    }

    #[test]
    fn test_unreadable_token_file_discarded() {
        let dir = TempDir::new().unwrap();
        let auth = test_auth(&dir);
        fs::write(dir.path().join("OneMapToken.key"), "{\"access_token\": 1").unwrap();

        assert!(auth.stored_token(0.0).unwrap().is_none());
        assert!(!dir.path().join("OneMapToken.key").exists());
    }

    #[test]
    fn test_response_without_token_is_auth_failure() {
        let dir = TempDir::new().unwrap();
        let auth = test_auth(&dir);
        let err = auth.store_token(&json!({"error": "Invalid credentials"})).unwrap_err();
        assert!(matches!(err, GeoError::Authentication(_)));
        assert!(!dir.path().join("OneMapToken.key").exists());
    }

    #[test]
    fn test_missing_credentials_is_auth_failure() {
        let dir = TempDir::new().unwrap();
        let err = test_auth(&dir).read_credentials().unwrap_err();
        assert!(matches!(err, GeoError::Authentication(_)));
    }

    #[test]
    fn test_freshness_respects_margin() {
        let dir = TempDir::new().unwrap();
        let auth = test_auth(&dir);
        let token = Token {
            access_token: "abc".into(),
            expiry: 2_000.0,
        };
        assert!(auth.is_fresh(&token, 1_000.0));
        assert!(!auth.is_fresh(&token, 1_400.0));
        assert!(!auth.is_fresh(&token, 3_000.0));
    }

    #[test]
    fn test_response_without_expiry_is_auth_failure() {
        let dir = TempDir::new().unwrap();
        let auth = test_auth(&dir);
        let err = auth.store_token(&json!({"access_token": "abc"})).unwrap_err();
        assert!(matches!(err, GeoError::Authentication(_)));
    }
}
