use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CasError, Result};
use crate::identity::claim_types;
use crate::provider::{CasAuthenticationProvider, DefaultProvider};
use crate::session::SessionKeys;
use crate::state::{random_token, JwtStateFormat, SecureDataFormat};
use crate::validator::TicketValidator;

/// When the 401 catcher starts a CAS login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMode {
    /// Every 401 becomes a challenge.
    Active,
    /// Only requests that asked for a challenge.
    #[default]
    Passive,
}

/// Raw settings, read from the `cas` key of the Rocket figment.
///
/// ```toml
/// [default.cas]
/// server_url_base = "https://cas.example.com/cas"
/// protocol = "cas2"
/// name_identifier_attribute = "uid"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CasConfig {
    pub server_url_base: String,
    pub callback_path: String,
    /// Seconds.
    pub backchannel_timeout: u64,
    pub protocol: TicketValidator,
    pub authentication_type: String,
    /// Display name of the login option, for sign-in pages.
    pub caption: String,
    pub authentication_mode: AuthenticationMode,
    pub name_claim_type: String,
    pub name_identifier_attribute: Option<String>,
    pub sign_in_as: Option<String>,
    pub default_scheme: String,
    /// Read the scheme from `X-Forwarded-Proto`. Only turn on behind a proxy
    /// that sets or strips the header.
    pub trust_forwarded_proto: bool,
    pub state_secret: Option<String>,
    /// Seconds, also the lifetime of the correlation cookie.
    pub state_lifetime: u64,
    pub session_cookie: String,
    pub session_secret: Option<String>,
    /// Seconds.
    pub session_lifetime: u64,
}

impl Default for CasConfig {
    fn default() -> Self {
        CasConfig {
            server_url_base: String::new(),
            callback_path: String::from("/signin-cas"),
            backchannel_timeout: 60,
            protocol: TicketValidator::default(),
            authentication_type: String::from("CAS"),
            caption: String::from("CAS"),
            authentication_mode: AuthenticationMode::default(),
            name_claim_type: claim_types::NAME.to_string(),
            name_identifier_attribute: None,
            sign_in_as: Some(String::from("Cookies")),
            default_scheme: String::from("https"),
            trust_forwarded_proto: false,
            state_secret: None,
            state_lifetime: 15 * 60,
            session_cookie: String::from("token"),
            session_secret: None,
            session_lifetime: 8 * 60 * 60,
        }
    }
}

/// Validated, read-only settings shared by every request.
pub struct CasAuthenticationOptions {
    pub server_url_base: String,
    pub callback_path: String,
    pub backchannel_timeout: Duration,
    pub ticket_validator: TicketValidator,
    pub authentication_type: String,
    pub caption: String,
    pub authentication_mode: AuthenticationMode,
    pub name_claim_type: String,
    pub name_identifier_attribute: Option<String>,
    pub sign_in_as: Option<String>,
    pub default_scheme: String,
    pub trust_forwarded_proto: bool,
    pub state_lifetime: Duration,
    pub session_cookie: String,
    pub session_lifetime: Duration,
    pub provider: Arc<dyn CasAuthenticationProvider>,
    pub state_format: Arc<dyn SecureDataFormat>,
    pub session_keys: SessionKeys,
}

impl CasAuthenticationOptions {
    pub fn from_config(config: CasConfig) -> Result<Self> {
        Url::parse(&config.server_url_base)
            .map_err(|e| CasError::Config(format!("server_url_base {:?}: {e}", config.server_url_base)))?;
        if !config.callback_path.starts_with('/') || config.callback_path.len() < 2 {
            return Err(CasError::Config(format!(
                "callback_path must be an absolute, non-root path, got {:?}",
                config.callback_path
            )));
        }
        if config.authentication_type.is_empty() {
            return Err(CasError::Config(String::from("authentication_type can't be empty")));
        }

        let state_secret = secret_or_random("state_secret", config.state_secret);
        let state_lifetime = Duration::from_secs(config.state_lifetime);
        let state_format = JwtStateFormat::new(
            state_secret.as_bytes(),
            chrono::Duration::seconds(config.state_lifetime as i64),
        );
        let session_keys = SessionKeys::new(secret_or_random("session_secret", config.session_secret).as_bytes());

        Ok(CasAuthenticationOptions {
            server_url_base: config.server_url_base.trim_end_matches('/').to_string(),
            callback_path: config.callback_path,
            backchannel_timeout: Duration::from_secs(config.backchannel_timeout),
            ticket_validator: config.protocol,
            authentication_type: config.authentication_type,
            caption: config.caption,
            authentication_mode: config.authentication_mode,
            name_claim_type: config.name_claim_type,
            name_identifier_attribute: config.name_identifier_attribute,
            sign_in_as: config.sign_in_as,
            default_scheme: config.default_scheme,
            trust_forwarded_proto: config.trust_forwarded_proto,
            state_lifetime,
            session_cookie: config.session_cookie,
            session_lifetime: Duration::from_secs(config.session_lifetime),
            provider: Arc::new(DefaultProvider),
            state_format: Arc::new(state_format),
            session_keys,
        })
    }

    /// Property key and cookie name holding the correlation token.
    pub fn correlation_key(&self) -> String {
        format!("cas.correlation.{}", self.authentication_type)
    }
}

fn secret_or_random(name: &str, configured: Option<String>) -> String {
    match configured {
        Some(secret) if !secret.is_empty() => secret,
        _ => {
            tracing::warn!("no {name} configured, using a random one; it won't survive a restart or be shared between instances");
            random_token(64)
        }
    }
}
