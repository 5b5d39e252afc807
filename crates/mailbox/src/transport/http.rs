//! HTTP transport for the remote store
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use super::{Body, Method, Request, Transport};
use crate::config::MailboxConfig;
use crate::error::{MailboxError, Result};

/// Blocking client for the mail service
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: Url,
    auth_header: Option<String>,
}

impl HttpTransport {
    /// Create a transport for the configured service
    pub fn new(config: &MailboxConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.request_timeout_secs)))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            agent: agent_config.into(),
            base_url,
            auth_header: config.auth_header.clone(),
        })
    }

    /// Full URL of a request, query included
    pub fn url_for(&self, request: &Request) -> Result<Url> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| MailboxError::transport(format!("Invalid request path {}: {}", request.path, e)))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn send(&self, request: &Request, url: &str) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        match request.method {
            Method::Get => self.with_auth_get(self.agent.get(url)).call(),
            Method::Delete => {
                let builder = self.with_auth_get(self.agent.delete(url));
                match &request.body {
                    Body::Empty => builder.call(),
                    body => send_body(builder.force_send_body(), body),
                }
            }
            Method::Post => send_body(self.with_auth_body(self.agent.post(url)), &request.body),
            Method::Put => send_body(self.with_auth_body(self.agent.put(url)), &request.body),
        }
    }

    fn with_auth_get(
        &self,
        builder: ureq::RequestBuilder<ureq::typestate::WithoutBody>,
    ) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        match &self.auth_header {
            Some(value) => builder.header("Authorization", value),
            None => builder,
        }
    }

    fn with_auth_body(
        &self,
        builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    ) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        match &self.auth_header {
            Some(value) => builder.header("Authorization", value),
            None => builder,
        }
    }
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: &Body,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Body::Empty => builder.send_empty(),
        Body::Json(value) => builder.send_json(value),
        Body::File {
            filename,
            content_type,
            bytes,
        } => builder
            .header(
                "Content-Type",
                content_type.as_deref().unwrap_or("application/octet-stream"),
            )
            .header(
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", urlencoding::encode(filename)),
            )
            .send(&bytes[..]),
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| MailboxError::transport(format!("Invalid base URL {}: {}", raw, e)))
}

impl Transport for HttpTransport {
    fn execute(&self, request: &Request) -> Result<Value> {
        let url = self.url_for(request)?;
        log::debug!("{} {}", request.method.as_str(), url);

        let mut response = self
            .send(request, url.as_str())
            .map_err(|e| MailboxError::transport(format!("{} {} failed: {}", request.method.as_str(), request.path, e)))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| MailboxError::transport(format!("Failed to read response body: {}", e)))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(_) if status >= 400 => Value::String(text),
                Err(e) => return Err(e.into()),
            }
        };

        if status >= 400 {
            log::warn!("{} {} returned {}", request.method.as_str(), request.path, status);
            return Err(MailboxError::from_status(status, &body));
        }

        Ok(body)
    }
}
