//! HTTP plumbing shared by the reader and writer legs.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::config::SessionOptions;
use crate::{AppError, Result};

/// Header carrying the node identifier.
pub const MACHINE_ID_HEADER: &str = "machine_id";
/// Header selecting the leg direction.
pub const SESSION_TYPE_HEADER: &str = "session_type";
/// Header carrying the control-plane token.
pub const TOKEN_HEADER: &str = "token";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Direction of a session leg, as seen from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    /// Control plane → node.
    Read,
    /// Node → control plane.
    Write,
}

impl SessionType {
    /// Header value for this leg.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Opens session legs against one control-plane endpoint.
#[derive(Debug, Clone)]
pub(crate) struct ControlPlaneClient {
    http: Client,
    endpoint: Url,
    machine_id: String,
    token: Option<String>,
}

impl ControlPlaneClient {
    /// Build a client for `endpoint`.
    ///
    /// Connections are not pooled: every leg dials its own connection so a
    /// new generation never reuses a socket from the previous one.
    pub(crate) fn new(endpoint: &str, options: &SessionOptions) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| AppError::Config(format!("invalid endpoint {endpoint}: {err}")))?;

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            endpoint,
            machine_id: options.machine_id.clone(),
            token: options.token.clone(),
        })
    }

    /// Open one leg with `body` as the request body.
    ///
    /// Resolves once the control plane sends response headers.
    pub(crate) async fn open(
        &self,
        session_type: SessionType,
        body: reqwest::Body,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(MACHINE_ID_HEADER, &self.machine_id)
            .header(SESSION_TYPE_HEADER, session_type.as_str());
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        Ok(request.body(body).send().await?)
    }
}
