//! HTTP speech bridge
//!
//! Talks to a REST bridge in front of the synthesizer and recognizer:
//! `POST {endpoint}/speak` blocks until playback finished, `POST
//! {endpoint}/listen` returns one transcript.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use voice_support_config::SpeechConfig;
use voice_support_core::{AccessToken, EndOfSpeech, ListenOutcome, SpeakRequest, SpeechError, SpeechProvider};

#[derive(Serialize)]
struct SpeakBody<'a> {
    call_id: &'a str,
    ssml: &'a str,
    voice: &'a str,
    lang: &'a str,
}

#[derive(Serialize)]
struct ListenBody<'a> {
    call_id: &'a str,
    max_duration_ms: u64,
}

#[derive(Deserialize)]
struct ListenResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default = "default_end")]
    end: EndOfSpeech,
}

fn default_end() -> EndOfSpeech {
    EndOfSpeech::Detected
}

/// Speech provider bound to one call on the bridge
pub struct HttpSpeechProvider {
    client: reqwest::Client,
    endpoint: String,
    call_id: String,
}

impl HttpSpeechProvider {
    pub fn new(config: &SpeechConfig, call_id: impl Into<String>) -> Result<Self, SpeechError> {
        // Listen requests are bounded per call by the Listen command itself
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, &config.endpoint, call_id))
    }

    /// Share one connection pool across calls
    pub fn with_client(client: reqwest::Client, endpoint: &str, call_id: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            call_id: call_id.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        token: &AccessToken,
        body: &B,
    ) -> Result<reqwest::Response, SpeechError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&token.value)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SpeechError::Transient(format!("{} request timed out", path))
                } else {
                    SpeechError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }
}

/// 5xx and 429 are worth one more try; auth rejections end the session
fn classify_status(status: StatusCode, body: String) -> SpeechError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        SpeechError::Transient(format!("Provider returned {}: {}", status, body))
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SpeechError::Auth(format!("Provider refused token: {}", status))
    } else {
        SpeechError::InvalidResponse(format!("Provider returned {}: {}", status, body))
    }
}

#[async_trait]
impl SpeechProvider for HttpSpeechProvider {
    async fn speak(&self, token: &AccessToken, request: &SpeakRequest) -> Result<(), SpeechError> {
        let body = SpeakBody {
            call_id: &self.call_id,
            ssml: &request.markup,
            voice: &request.voice,
            lang: &request.locale,
        };
        self.post("speak", token, &body).await?;
        Ok(())
    }

    async fn listen(&self, token: &AccessToken, max_duration: Duration) -> Result<ListenOutcome, SpeechError> {
        let body = ListenBody {
            call_id: &self.call_id,
            max_duration_ms: max_duration.as_millis() as u64,
        };
        let response = self.post("listen", token, &body).await?;

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(e.to_string()))?;

        Ok(ListenOutcome {
            transcript: parsed.text,
            confidence: parsed.confidence.clamp(0.0, 1.0),
            end: parsed.end,
        })
    }

    fn name(&self) -> &str {
        "http-bridge"
    }
}
