//! The service under test.
//!
//! Runs talk to the target only through [`Target`], so that the engine can be exercised
//! against an in-process fake as easily as against a live HTTP service.
use crate::error::{SetupError, TargetError};
use crate::payload::SignupPayload;
use reqwest::Client;
use stampede_core::RunConfig;
use url::Url;

/// An immutable view of one signup response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[trait_variant::make(Target: Send)]
pub trait LocalTarget {
    /// Status returned by the health endpoint (`GET /`).
    async fn health(&self) -> Result<u16, TargetError>;

    /// Issue one signup request. Timeouts are enforced by the caller.
    async fn signup(&self, payload: &SignupPayload) -> Result<ResponseSnapshot, TargetError>;
}

/// [`Target`] implementation speaking HTTP via `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTarget {
    client: Client,
    health_url: Url,
    signup_url: Url,
}

impl HttpTarget {
    pub fn new(config: &RunConfig) -> Result<Self, SetupError> {
        let client = Client::builder()
            .user_agent(concat!("stampede/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SetupError::Client)?;

        Ok(Self {
            client,
            health_url: config.health_url(),
            signup_url: config.signup_url()?,
        })
    }
}

impl Target for HttpTarget {
    async fn health(&self) -> Result<u16, TargetError> {
        let res = self.client.get(self.health_url.clone()).send().await?;
        Ok(res.status().as_u16())
    }

    async fn signup(&self, payload: &SignupPayload) -> Result<ResponseSnapshot, TargetError> {
        let res = self
            .client
            .post(self.signup_url.clone())
            .json(payload)
            .send()
            .await?;
        let status = res.status().as_u16();
        let body = res.bytes().await?;
        Ok(ResponseSnapshot::new(status, body.to_vec()))
    }
}
