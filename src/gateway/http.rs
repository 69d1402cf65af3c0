use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::client::GatewayError;
use super::{normalize_body, BackendRoute, Gateway, GatewayResponse};
use crate::config::BackendConfig;

/// Gateway that talks to the PHP route files over HTTP.
///
/// Requests are form-encoded with two fields, `operation` and `json`, and
/// posted to `<base_url>/<route>.php`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl HttpGateway {
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            client,
        })
    }

    pub fn endpoint(&self, route: BackendRoute) -> String {
        format!("{}/{}", self.base_url, route.script())
    }

    fn transport_failure(&self, operation: &str, err: &reqwest::Error) -> GatewayResponse {
        if err.is_timeout() {
            GatewayResponse::failure(format!(
                "{operation} timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            GatewayResponse::failure(format!("{operation} request failed: {err}"))
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn invoke(
        &self,
        route: BackendRoute,
        operation: &str,
        payload: Value,
    ) -> GatewayResponse {
        let url = self.endpoint(route);
        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(err) => {
                return GatewayResponse::failure(format!("unable to encode {operation}: {err}"))
            }
        };

        debug!(%route, operation, "dispatching backend operation");

        let response = match self
            .client
            .post(&url)
            .form(&[("operation", operation), ("json", json.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%route, operation, error = %err, "backend transport failure");
                return self.transport_failure(operation, &err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%route, operation, status = status.as_u16(), "backend returned error status");
            return GatewayResponse::failure(format!(
                "{operation} returned HTTP {}",
                status.as_u16()
            ));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%route, operation, error = %err, "unable to read backend response");
                return self.transport_failure(operation, &err);
            }
        };

        // PHP scripts saved with a BOM prefix it to every response.
        let body = body.trim_start_matches('\u{feff}').trim();
        if body.is_empty() {
            return GatewayResponse::failure(format!("{operation} returned an empty body"));
        }

        match serde_json::from_str::<Value>(body) {
            Ok(value) => {
                let normalized = normalize_body(value);
                if !normalized.success {
                    debug!(
                        %route,
                        operation,
                        message = normalized.message.as_deref().unwrap_or_default(),
                        "backend reported failure"
                    );
                }
                normalized
            }
            Err(err) => {
                warn!(%route, operation, error = %err, "malformed backend response");
                GatewayResponse::failure(format!("{operation} returned a malformed body: {err}"))
            }
        }
    }
}
