//! Credential exchange against AWS STS.
//!
//! One `AssumeRoleWithSAML` call per profile, no retries. A rejection
//! (expired assertion, clock skew, unauthorized role) surfaces immediately
//! as a per-profile [`Error::ExchangeRejected`].

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Region used when the ambient AWS environment supplies none.
/// AssumeRoleWithSAML is an unsigned call, so any STS endpoint answers.
const FALLBACK_REGION: &str = "us-east-1";

/// An opaque base64 SAML response captured from the IdP redirect page.
///
/// The value is a bearer secret: it is consumed exactly once by the
/// exchange adapter, never persisted, and `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SamlAssertion(String);

impl SamlAssertion {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SamlAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SamlAssertion(redacted)")
    }
}

/// A temporary credential set returned by the trust exchange.
#[derive(Debug, Clone)]
pub struct StsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// Seam between ceremony output and AWS, so batch logic tests without STS.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Trade `assertion` for temporary credentials targeting `profile`.
    async fn exchange(&self, assertion: &SamlAssertion, profile: &Profile)
        -> Result<StsCredentials>;
}

/// Production exchange through `AssumeRoleWithSAML`.
pub struct StsExchange {
    client: StsClient,
}

impl StsExchange {
    /// Build a client from the ambient AWS environment, falling back to a
    /// fixed region when none is configured anywhere in the chain.
    pub async fn new() -> Self {
        let config = {
            let loaded = aws_config::defaults(BehaviorVersion::latest()).load().await;
            match loaded.region() {
                Some(_) => loaded,
                None => {
                    debug!("No region configured, using {} for STS", FALLBACK_REGION);
                    aws_config::defaults(BehaviorVersion::latest())
                        .region(Region::new(FALLBACK_REGION))
                        .load()
                        .await
                }
            }
        };
        Self {
            client: StsClient::new(&config),
        }
    }
}

#[async_trait]
impl CredentialExchange for StsExchange {
    async fn exchange(
        &self,
        assertion: &SamlAssertion,
        profile: &Profile,
    ) -> Result<StsCredentials> {
        profile.validate()?;

        info!("Calling AWS STS AssumeRoleWithSAML for {}", profile.name);
        debug!("Role ARN: {}", profile.role_arn());
        debug!("Principal ARN: {}", profile.principal_arn());
        debug!("Duration: {} seconds", profile.duration_seconds);

        let response = self
            .client
            .assume_role_with_saml()
            .role_arn(profile.role_arn())
            .principal_arn(profile.principal_arn())
            .saml_assertion(assertion.as_str())
            .duration_seconds(profile.duration_seconds)
            .send()
            .await
            .map_err(|e| Error::ExchangeRejected(format!("{}", DisplayErrorContext(&e))))?;

        let creds = response
            .credentials()
            .ok_or_else(|| Error::ExchangeRejected("STS returned no credentials".to_string()))?;

        Ok(StsCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration: DateTime::from_timestamp(
                creds.expiration().secs(),
                creds.expiration().subsec_nanos(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_debug_never_prints_value() {
        let assertion = SamlAssertion::new("PHNhbWxwOlJlc3BvbnNlPg==".to_string());
        let rendered = format!("{:?}", assertion);
        assert!(!rendered.contains("PHNhbWxw"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn assertion_emptiness_is_observable() {
        assert!(SamlAssertion::new(String::new()).is_empty());
        assert!(!SamlAssertion::new("x".to_string()).is_empty());
    }
}
