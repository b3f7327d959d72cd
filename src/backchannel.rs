//! Server-to-server HTTP used to redeem tickets.

use std::time::Duration;

use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, HttpClient};

use crate::error::{CasError, Result};

#[rocket::async_trait]
pub trait Backchannel: Send + Sync {
    /// GET `url` and return the body. Non-2xx answers are errors.
    async fn get(&self, url: &str) -> Result<String>;
}

/// Pooled isahc client, built once at ignition and shared by every request.
pub struct IsahcBackchannel {
    client: HttpClient,
}

impl IsahcBackchannel {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(IsahcBackchannel { client })
    }
}

#[rocket::async_trait]
impl Backchannel for IsahcBackchannel {
    async fn get(&self, url: &str) -> Result<String> {
        let mut response = self.client.get_async(url).await?;
        if !response.status().is_success() {
            return Err(CasError::BackchannelStatus(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}
