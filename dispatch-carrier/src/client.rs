use dispatch_core::carrier::{
    CarrierApi, CarrierPickupResponse, CarrierShipmentResponse, PickupPayload, ShipmentPayload,
};
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::ScanEvent;
use serde_json::Value;
use std::time::Duration;

use crate::decode;

/// Configuration for the carrier HTTP client.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    /// Ordered base URLs; earlier entries are tried first and later
    /// ones are failover targets (e.g. staging then production).
    pub endpoints: Vec<String>,
    pub token: Option<String>,
    /// Hard per-attempt timeout.
    pub timeout_secs: u64,
    /// Retry budget per endpoint for retryable failures.
    pub max_attempts: u32,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            token: None,
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

/// How a single attempt ended, before retry policy is applied.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Value),
    /// Retryable after the fixed cool-down.
    RateLimited,
    /// Retryable on this endpoint, then across endpoints.
    Transient(String),
    /// Terminal; no retry anywhere.
    Terminal(DispatchError),
}

/// Classify an HTTP response status + body into retry semantics.
///
/// 2xx success, 401 auth (terminal), 429 rate limited (retry after a
/// cool-down), other 4xx carrier validation (terminal), 5xx transient.
pub fn classify_response(status: u16, body: Value, body_text: String) -> AttemptOutcome {
    match status {
        200..=299 => AttemptOutcome::Success(body),
        401 => AttemptOutcome::Terminal(DispatchError::AuthError(
            "carrier rejected the token or does not recognize the target resource".into(),
        )),
        429 => AttemptOutcome::RateLimited,
        400..=499 => AttemptOutcome::Terminal(DispatchError::ValidationError(body_text)),
        _ => AttemptOutcome::Transient(format!("carrier returned HTTP {}", status)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request body variants the carrier API uses.
#[derive(Debug, Clone)]
pub enum Body {
    None,
    Form(Vec<(&'static str, String)>),
    Json(Value),
}

const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(2);
const BACKOFF_BASE_MS: u64 = 250;

/// Low-level HTTP client for the carrier API: endpoint failover,
/// auth-token injection, retry/backoff, response classification.
/// Stateless per invocation beyond the outbound call itself.
pub struct CarrierClient {
    http: reqwest::Client,
    config: CarrierConfig,
}

impl CarrierClient {
    pub fn new(config: CarrierConfig) -> DispatchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DispatchError::Internal(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn token(&self) -> DispatchResult<&str> {
        self.config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DispatchError::Configuration("carrier API token is not set".into()))
    }

    /// Send one logical request, retrying across attempts and endpoints
    /// per the classification policy. Terminal outcomes short-circuit.
    pub async fn send(&self, method: Method, path: &str, body: Body) -> DispatchResult<Value> {
        let token = self.token()?.to_string();
        if self.config.endpoints.is_empty() {
            return Err(DispatchError::Configuration(
                "no carrier endpoints configured".into(),
            ));
        }

        let mut last_failure = DispatchError::Transient("no attempt made".into());

        for endpoint in &self.config.endpoints {
            let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
            let mut attempt: u32 = 0;

            while attempt < self.config.max_attempts {
                match self.attempt(method, &url, &body, &token).await {
                    AttemptOutcome::Success(v) => return Ok(v),
                    AttemptOutcome::Terminal(e) => return Err(e),
                    AttemptOutcome::RateLimited => {
                        tracing::warn!(url = %url, "carrier rate limited, cooling down");
                        last_failure =
                            DispatchError::RateLimited("carrier returned HTTP 429".into());
                        tokio::time::sleep(RATE_LIMIT_COOLDOWN).await;
                    }
                    AttemptOutcome::Transient(msg) => {
                        tracing::warn!(url = %url, attempt, error = %msg, "carrier attempt failed");
                        last_failure = DispatchError::Transient(msg);
                        // Exponential backoff between retries on the same
                        // endpoint; the switch to the next endpoint below
                        // happens without an extra pause.
                        if attempt + 1 < self.config.max_attempts {
                            let backoff = BACKOFF_BASE_MS * (1 << attempt.min(4));
                            tokio::time::sleep(Duration::from_millis(backoff)).await;
                        }
                    }
                }
                attempt += 1;
            }
        }

        Err(last_failure)
    }

    async fn attempt(&self, method: Method, url: &str, body: &Body, token: &str) -> AttemptOutcome {
        let builder = match method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
        };
        let builder = builder
            .header("Authorization", format!("Token {}", token))
            .header("Accept", "application/json");
        let builder = match body {
            Body::None => builder,
            Body::Form(fields) => builder.form(fields),
            Body::Json(v) => builder.json(v),
        };

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                return AttemptOutcome::Transient(format!("network failure: {}", e));
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        classify_response(status, json, text)
    }
}

#[async_trait::async_trait]
impl CarrierApi for CarrierClient {
    async fn generate_waybills(&self, count: u32) -> DispatchResult<Vec<String>> {
        let body = Body::Form(vec![("count", count.to_string())]);
        let value = self.send(Method::Post, "/waybill/api/bulk/json/", body).await?;
        decode::waybill_batch(&value)
    }

    async fn fetch_waybill(&self) -> DispatchResult<String> {
        let value = self
            .send(Method::Get, "/waybill/api/fetch/json/", Body::None)
            .await?;
        decode::single_waybill(&value)
    }

    async fn create_shipment(
        &self,
        payload: &ShipmentPayload,
    ) -> DispatchResult<CarrierShipmentResponse> {
        let data = serde_json::to_string(payload)
            .map_err(|e| DispatchError::Internal(format!("payload serialization: {}", e)))?;
        let body = Body::Form(vec![("format", "json".to_string()), ("data", data)]);
        let value = self.send(Method::Post, "/api/cmu/create.json", body).await?;
        decode::shipment_response(&value)
    }

    async fn create_pickup(
        &self,
        payload: &PickupPayload,
    ) -> DispatchResult<CarrierPickupResponse> {
        let body = Body::Json(
            serde_json::to_value(payload)
                .map_err(|e| DispatchError::Internal(format!("payload serialization: {}", e)))?,
        );
        let value = self.send(Method::Post, "/fm/request/new/", body).await?;
        decode::pickup_response(&value)
    }

    async fn track(&self, waybill: &str) -> DispatchResult<Vec<ScanEvent>> {
        let path = format!("/api/v1/packages/json/?waybill={}", waybill);
        let value = self.send(Method::Get, &path, Body::None).await?;
        decode::tracking_scans(waybill, &value)
    }
}
