//! HTTP implementation of [`VerificationApi`] on top of reqwest

use std::error::Error as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kycshield_common::{Capability, KycError, RawResponse, Result, ValidationError};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{HealthStatus, VerificationApi, VerificationRequest};
use crate::config::ClientConfig;
use crate::session::{AccessToken, Session};

const LOGIN_PATH: &str = "/api/v1/auth/login";
const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// reqwest-backed verification client
pub struct HttpVerificationApi {
    client: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
    request_timeout: Duration,
}

impl HttpVerificationApi {
    /// Create a client bound to one session
    pub fn new(config: &ClientConfig, session: Arc<Session>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect_timeout())
            .timeout(config.timeouts.request_timeout())
            .user_agent(format!("kycshield/{}", kycshield_common::VERSION))
            .build()
            .map_err(|e| KycError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            session,
            request_timeout: config.timeouts.request_timeout(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Exchange credentials for a token and store it in the session
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| self.transport_error(None, e))?;

        let body = decode_json(response, |e| self.transport_error(None, e)).await?;
        let token: AccessToken = serde_json::from_value(body)?;
        self.session.set(token.clone());
        Ok(token)
    }

    /// Trade the session's refresh token for a new access token
    ///
    /// The service may omit the refresh token in its answer; the current
    /// one is kept then. A rejected refresh leaves the session untouched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<AccessToken> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or(ValidationError::MissingRefreshToken)?;

        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| self.transport_error(None, e))?;

        let body = decode_json(response, |e| self.transport_error(None, e)).await?;
        let mut token: AccessToken = serde_json::from_value(body)?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token);
        }
        self.session.set(token.clone());
        Ok(token)
    }

    /// Forget the session token
    pub fn logout(&self) {
        self.session.clear();
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn form(request: &VerificationRequest) -> Result<Form> {
        let mut form = Form::new();
        for part in &request.parts {
            let file_part = Part::bytes(part.file.bytes.to_vec())
                .file_name(part.file.file_name.clone())
                .mime_str(&part.file.content_type)
                .map_err(|e| {
                    KycError::Transport(format!(
                        "invalid content type '{}': {}",
                        part.file.content_type, e
                    ))
                })?;
            form = form.part(part.field.clone(), file_part);
        }
        Ok(form)
    }

    fn transport_error(&self, capability: Option<Capability>, err: reqwest::Error) -> KycError {
        match capability {
            Some(capability) if err.is_timeout() => KycError::Timeout {
                capability,
                limit_ms: self.request_timeout.as_millis() as u64,
            },
            _ => match err.source() {
                Some(source) => KycError::Transport(format!("{}: {}", err, source)),
                None => KycError::Transport(err.to_string()),
            },
        }
    }
}

#[async_trait]
impl VerificationApi for HttpVerificationApi {
    #[instrument(skip(self, request), fields(capability = %request.capability))]
    async fn submit(&self, request: &VerificationRequest) -> Result<RawResponse> {
        let capability = request.capability;
        let form = Self::form(request)?;

        let mut builder = self
            .client
            .post(self.url(capability.endpoint_path()))
            .multipart(form);

        // No token is not an error here: the service rejects the call
        match self.session.bearer() {
            Some(token) => builder = builder.bearer_auth(token),
            None => warn!("Sending verification without a session token"),
        }

        info!(bytes = request.payload_bytes(), "Submitting verification");
        let started = Instant::now();

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(Some(capability), e))?;

        debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Verification response received"
        );

        let body = decode_json(response, |e| self.transport_error(Some(capability), e)).await?;

        Ok(RawResponse::from_value(body))
    }

    #[instrument(skip(self))]
    async fn health(&self, capability: Capability) -> Result<HealthStatus> {
        let response = self
            .client
            .get(self.url(capability.health_path()))
            .send()
            .await
            .map_err(|e| self.transport_error(Some(capability), e))?;

        let body = decode_json(response, |e| self.transport_error(Some(capability), e)).await?;
        Ok(serde_json::from_value(body)?)
    }
}

/// Read a body as JSON, turning non-success statuses into [`KycError::Api`]
async fn decode_json<F>(response: reqwest::Response, on_error: F) -> Result<Value>
where
    F: FnOnce(reqwest::Error) -> KycError,
{
    let status = response.status();
    let text = response.text().await.map_err(on_error)?;

    if !status.is_success() {
        return Err(KycError::Api {
            status: status.as_u16(),
            message: error_detail(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string()),
        });
    }

    Ok(serde_json::from_str(&text)?)
}

/// Pull the service's `detail` message out of an error body
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        _ => Some(trimmed.chars().take(200).collect()),
    }
}
