//! Protection of the `state` query parameter.
//!
//! The state leaves the server inside the CAS service URL and comes back on the
//! callback, so it must be tamper-evident and short-lived. Anything that fails
//! to decode is treated as absent.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::properties::AuthenticationProperties;

pub trait SecureDataFormat: Send + Sync {
    fn protect(&self, properties: &AuthenticationProperties) -> Result<String>;

    /// Returns `None` for malformed, expired or tampered input.
    fn unprotect(&self, protected: &str) -> Option<AuthenticationProperties>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    exp: usize,
    iat: usize,
    #[serde(flatten)]
    properties: AuthenticationProperties,
}

/// HS256 JWT carrying the properties, an issue time and an expiry.
pub struct JwtStateFormat {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtStateFormat {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        JwtStateFormat {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }
}

impl SecureDataFormat for JwtStateFormat {
    fn protect(&self, properties: &AuthenticationProperties) -> Result<String> {
        let now = Utc::now();
        let claims = StateClaims {
            exp: (now + self.lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
            properties: properties.clone(),
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn unprotect(&self, protected: &str) -> Option<AuthenticationProperties> {
        let validation = Validation::new(Algorithm::HS256);
        match jsonwebtoken::decode::<StateClaims>(protected, &self.decoding, &validation) {
            Ok(data) => Some(data.claims.properties),
            Err(e) => {
                tracing::debug!(error = %e, "rejected protected state");
                None
            }
        }
    }
}

/// Random alphanumeric string, used for correlation tokens and fallback secrets.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
