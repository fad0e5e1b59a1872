use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;

use crate::errors::{AgentError, AgentResult, ProviderError};
use crate::models::request::Request;
use crate::models::response::Response;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// What decoding one reply produced
#[derive(Debug, Clone)]
pub enum Decoded {
    /// The turn is not over yet; send this request again
    Request(Request),
    Response(Response),
}

/// Translation between a request and one provider's wire format
pub trait Encoder: Send + Sync {
    fn encode(&self, request: &Request) -> Result<Value, ProviderError>;

    /// Fold a reply into the request: append the assistant message and add this turn's usage
    fn decode(&self, request: Request, reply: &Value) -> Result<Decoded, ProviderError>;
}

/// An encoder that also knows where and how to send its payloads
pub trait Provider: Encoder {
    fn name(&self) -> &'static str;

    fn http_request(&self, request: &Request, body: &Value) -> HttpRequest;
}

/// Anything that can take a request through one model turn
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(&self, request: Request) -> AgentResult<Decoded>;
}

/// A provider talking through a transport
pub struct ProviderClient<P, T> {
    provider: P,
    transport: T,
}

impl<P: Provider, T: Transport> ProviderClient<P, T> {
    pub fn new(provider: P, transport: T) -> Self {
        Self {
            provider,
            transport,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn post(&self, request: HttpRequest) -> anyhow::Result<(Value, u64)> {
        let started = Instant::now();
        let response = self.transport.send(request).await?;
        let elapsed = started.elapsed().as_millis() as u64;
        Ok((into_json(response)?, elapsed))
    }
}

fn into_json(response: HttpResponse) -> anyhow::Result<Value> {
    match response.status {
        200..=299 => response.json(),
        status @ (429 | 500..=599) => Err(anyhow!("Server error: {}", status)),
        status => Err(anyhow!("Request failed: {} - {}", status, response.body)),
    }
}

#[async_trait]
impl<P: Provider, T: Transport> ModelClient for ProviderClient<P, T> {
    async fn send(&self, request: Request) -> AgentResult<Decoded> {
        let body = self.provider.encode(&request)?;
        let http = self.provider.http_request(&request, &body);
        tracing::debug!(
            provider = self.provider.name(),
            url = %http.url,
            "sending request"
        );

        let (reply, elapsed) = self.post(http).await.map_err(AgentError::Transport)?;
        Ok(self.provider.decode(request.with_time(elapsed), &reply)?)
    }
}

#[async_trait]
impl<C: ModelClient + ?Sized> ModelClient for Box<C> {
    async fn send(&self, request: Request) -> AgentResult<Decoded> {
        (**self).send(request).await
    }
}
