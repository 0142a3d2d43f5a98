use std::time::Duration;

use async_trait::async_trait;

use crate::{errors::Error, ports::IpEcho, Result};

pub const DEFAULT_IP_ECHO_URL: &str = "https://ifconfig.me/ip";

/// Asks a plain-text "what is my ip" endpoint.
pub struct HttpIpEcho {
    client: reqwest::Client,
    url: String,
}

impl HttpIpEcho {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IpEcho for HttpIpEcho {
    async fn public_ip(&self) -> Result<String> {
        let ip = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let ip = ip.trim().to_string();
        if ip.is_empty() {
            return Err(Error::External(format!("{} returned an empty body", self.url)));
        }
        Ok(ip)
    }
}
