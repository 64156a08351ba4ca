//! Provider authorization
//!
//! The speech provider accepts short-lived bearer tokens. A token is obtained
//! by exchanging a signed assertion at the token endpoint; [`TokenManager`]
//! caches it and refreshes it shortly before expiry. Refresh failures are
//! always reported as [`SpeechError::Auth`], which ends the session.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use voice_support_config::SpeechConfig;
use voice_support_core::{AccessToken, SpeechError, TokenSource};

/// Caching token holder shared by every session
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<AccessToken>>,
    refresh_margin: Duration,
}

impl TokenManager {
    pub fn new(source: Arc<dyn TokenSource>, refresh_margin: Duration) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            refresh_margin,
        }
    }

    /// Current token, refreshed when it expires within the margin
    ///
    /// Concurrent callers wait on the same refresh instead of each hitting
    /// the token endpoint.
    pub async fn token(&self) -> Result<AccessToken, SpeechError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.expires_within(Utc::now(), self.refresh_margin) {
                return Ok(token.clone());
            }
            tracing::debug!(expires_at = %token.expires_at, "Refreshing speech token");
        }

        let fresh = self.source.fetch().await.map_err(|e| match e {
            SpeechError::Auth(message) => SpeechError::Auth(message),
            other => SpeechError::Auth(other.to_string()),
        })?;

        tracing::info!(expires_at = %fresh.expires_at, "Speech token acquired");
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token (e.g. after the provider rejected it)
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[derive(Serialize)]
struct AssertionHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    kid: &'a str,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    jwt: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    iam_token: String,
    expires_at: DateTime<Utc>,
}

/// Token source that signs an assertion with the service account secret
pub struct SignedTokenSource {
    client: reqwest::Client,
    endpoint: String,
    service_account_id: String,
    key_id: String,
    secret: String,
    ttl: Duration,
}

impl SignedTokenSource {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SpeechError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.token_endpoint.clone(),
            service_account_id: config.service_account_id.clone(),
            key_id: config.key_id.clone(),
            secret: config.signing_secret.clone(),
            ttl: Duration::from_secs(config.token_ttl_secs),
        })
    }

    /// Compact `header.claims.signature` assertion, SHA-256 keyed signature
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, SpeechError> {
        let header = AssertionHeader {
            alg: "HS256",
            typ: "JWT",
            kid: &self.key_id,
        };
        let claims = AssertionClaims {
            iss: &self.service_account_id,
            aud: &self.endpoint,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };

        let signing_input = format!("{}.{}", encode_part(&header)?, encode_part(&claims)?);
        let signature = hmac_sha256(self.secret.as_bytes(), signing_input.as_bytes())?;

        Ok(format!("{}.{}", signing_input, B64URL.encode(signature)))
    }
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, SpeechError> {
    serde_json::to_vec(value)
        .map(|bytes| B64URL.encode(bytes))
        .map_err(|e| SpeechError::Auth(format!("Failed to encode assertion: {}", e)))
}

#[async_trait]
impl TokenSource for SignedTokenSource {
    async fn fetch(&self) -> Result<AccessToken, SpeechError> {
        let jwt = self.assertion(Utc::now())?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&TokenRequest { jwt: &jwt })
            .send()
            .await
            .map_err(|e| SpeechError::Auth(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Auth(format!("Token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Auth(format!("Malformed token response: {}", e)))?;

        Ok(AccessToken {
            value: token.iam_token,
            expires_at: token.expires_at,
        })
    }
}

type HmacSha256 = Hmac<Sha256>;

/// RFC 2104 keyed hash over SHA-256
fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; 32], SpeechError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SpeechError::Auth(format!("Invalid signing key: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}
