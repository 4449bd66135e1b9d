//! Boundary to the remote device.
//!
//! [`RequestGateway`] is what the coordinator talks to; [`HttpGateway`] is the
//! implementation that speaks the device's HTTP API. Calls are cancelled by
//! dropping their future.

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;
use crate::model::{Snapshot, Statistics};

/// Async access to the device. Every call is one request.
pub trait RequestGateway: Send + Sync + 'static {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, GatewayError>> + Send;

    fn fetch_statistics(&self) -> impl Future<Output = Result<Statistics, GatewayError>> + Send;

    fn set_current_effect_index(
        &self,
        index: usize,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn set_effect_enabled(
        &self,
        index: usize,
        enable: bool,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn step(&self, forward: bool) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Change how long each effect runs, in milliseconds.
    fn update_settings(
        &self,
        effect_interval: u64,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One mutation the operator can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NavigateTo(usize),
    SetEnabled { index: usize, enable: bool },
    Step { forward: bool },
    UpdateInterval(u64),
}

impl Command {
    /// Name used when reporting a failure.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::NavigateTo(_) => "navigateTo",
            Self::SetEnabled { enable: true, .. } => "enableEffect",
            Self::SetEnabled { enable: false, .. } => "disableEffect",
            Self::Step { forward: true } => "nextEffect",
            Self::Step { forward: false } => "previousEffect",
            Self::UpdateInterval(_) => "updateSettings",
        }
    }

    pub async fn send<G: RequestGateway + ?Sized>(self, gateway: &G) -> Result<(), GatewayError> {
        match self {
            Self::NavigateTo(index) => gateway.set_current_effect_index(index).await,
            Self::SetEnabled { index, enable } => gateway.set_effect_enabled(index, enable).await,
            Self::Step { forward } => gateway.step(forward).await,
            Self::UpdateInterval(ms) => gateway.update_settings(ms).await,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NavigateTo(index) => write!(f, "navigateTo({index})"),
            Self::SetEnabled { index, .. } => write!(f, "{}({index})", self.operation()),
            Self::Step { .. } => write!(f, "{}", self.operation()),
            Self::UpdateInterval(ms) => write!(f, "updateSettings({ms} ms)"),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// [`RequestGateway`] over the device's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    prefix: String,
}

impl HttpGateway {
    /// `base_path` is prepended to every endpoint, e.g. `/led` turns
    /// `/getEffectList` into `/led/getEffectList`.
    pub fn new(base_url: &str, base_path: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            prefix: join_prefix(base_url, base_path),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.prefix)
    }

    async fn get(&self, endpoint: &str, operation: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response, operation)?;
        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }

    async fn post(
        &self,
        endpoint: &str,
        operation: &str,
        form: &[(&str, String)],
    ) -> Result<(), GatewayError> {
        log::debug!("POST {endpoint} {form:?}");
        let response = self
            .client
            .post(self.url(endpoint))
            .form(form)
            .send()
            .await
            .map_err(transport)?;
        check_status(response, operation)?;
        Ok(())
    }
}

fn join_prefix(base_url: &str, base_path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = base_path.trim_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

fn check_status(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
        })
    }
}

impl RequestGateway for HttpGateway {
    async fn fetch_snapshot(&self) -> Result<Snapshot, GatewayError> {
        let body = self.get("/getEffectList", "fetchSnapshot").await?;
        Snapshot::from_json(&body)
    }

    async fn fetch_statistics(&self) -> Result<Statistics, GatewayError> {
        let body = self.get("/getStatistics", "fetchStatistics").await?;
        Statistics::from_json(&body)
    }

    async fn set_current_effect_index(&self, index: usize) -> Result<(), GatewayError> {
        self.post(
            "/setCurrentEffectIndex",
            "navigateTo",
            &[("currentEffectIndex", index.to_string())],
        )
        .await
    }

    async fn set_effect_enabled(&self, index: usize, enable: bool) -> Result<(), GatewayError> {
        let (endpoint, operation) = if enable {
            ("/enableEffect", "enableEffect")
        } else {
            ("/disableEffect", "disableEffect")
        };
        self.post(endpoint, operation, &[("effectIndex", index.to_string())])
            .await
    }

    async fn step(&self, forward: bool) -> Result<(), GatewayError> {
        let (endpoint, operation) = if forward {
            ("/nextEffect", "nextEffect")
        } else {
            ("/previousEffect", "previousEffect")
        };
        self.post(endpoint, operation, &[]).await
    }

    async fn update_settings(&self, effect_interval: u64) -> Result<(), GatewayError> {
        self.post(
            "/settings",
            "updateSettings",
            &[("effectInterval", effect_interval.to_string())],
        )
        .await
    }
}
