//! Outbound connection to the time-series store.
//!
//! The reporter only sees the [`Connector`] / [`Connection`] pair, so the HTTP
//! transport below can be swapped for a fake in tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::point::Batch;
use crate::error::{SetupError, TransportError};

/// Result of a successful liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingInfo {
    pub rtt: Duration,
    pub version: Option<String>,
}

/// A live transport handle. Replaced wholesale when it goes bad.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Check the server is reachable within `timeout`.
    async fn ping(&self, timeout: Duration) -> Result<PingInfo, TransportError>;

    /// Write every measurement of `batch` to `batch.database`.
    async fn write(&self, batch: &Batch) -> Result<(), TransportError>;
}

/// Holds address and credentials; builds fresh connections on demand.
pub trait Connector: Send + Sync {
    type Connection: Connection;

    fn connect(&self) -> Result<Self::Connection, TransportError>;
}

// ─── InfluxDB 1.x HTTP API ───────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Address and credentials of an InfluxDB server.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    url: Url,
    credentials: Option<Credentials>,
}

/// `reqwest` client bound to one server.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    client: Client,
    ping_url: Url,
    write_url: Url,
    credentials: Option<Credentials>,
}

impl HttpConnector {
    /// Validate `url` (http or https). A username enables basic auth.
    pub fn new(
        url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, SetupError> {
        let parsed = Url::parse(url).map_err(|e| SetupError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SetupError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let credentials = username
            .filter(|u| !u.is_empty())
            .map(|username| Credentials { username, password });

        Ok(Self {
            url: parsed,
            credentials,
        })
    }
}

impl Connector for HttpConnector {
    type Connection = HttpConnection;

    fn connect(&self) -> Result<HttpConnection, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("influx-reporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpConnection {
            client,
            ping_url: endpoint(&self.url, "ping"),
            write_url: endpoint(&self.url, "write"),
            credentials: self.credentials.clone(),
        })
    }
}

impl HttpConnection {
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, c.password.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn ping(&self, timeout: Duration) -> Result<PingInfo, TransportError> {
        let start = Instant::now();
        let request = self
            .authorize(self.client.get(self.ping_url.clone()))
            .timeout(timeout);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Http(e)
            }
        })?;
        let response = check_status(response).await?;

        let version = response
            .headers()
            .get("X-Influxdb-Version")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(PingInfo {
            rtt: start.elapsed(),
            version,
        })
    }

    async fn write(&self, batch: &Batch) -> Result<(), TransportError> {
        let body = batch.to_line_protocol();
        if body.is_empty() {
            return Ok(());
        }

        let request = self
            .authorize(self.client.post(self.write_url.clone()))
            .query(&[("db", batch.database.as_str()), ("precision", "ns")])
            .body(body);

        check_status(request.send().await?).await?;
        Ok(())
    }
}

/// `base` with `path` appended to whatever path it already has.
fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!("{}/{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}
