//! HTTP seam between the protocol client and the network

use crate::config::RemoteConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// What the client needs from one HTTP exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    /// Names of the cookies set by the response
    pub cookies: Vec<String>,
}

impl HttpReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            cookies: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A connection to the task service
///
/// Implementations keep cookies across calls. Only failures to get any
/// answer are errors; a non-2xx status is returned as a reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply>;

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpReply>;
}

/// reqwest-backed transport with a cookie store
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client })
    }

    async fn reply(response: reqwest::Response) -> Result<HttpReply> {
        let status = response.status().as_u16();
        let cookies = response.cookies().map(|c| c.name().to_string()).collect();
        let body = response.text().await?;

        debug!(status, bytes = body.len(), "Received response");
        Ok(HttpReply {
            status,
            body,
            cookies,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).query(query).send().await?;
        Self::reply(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpReply> {
        debug!(url = %url, "POST");
        let mut request = self.client.post(url).form(form);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        Self::reply(response).await
    }
}
