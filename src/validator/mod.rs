//! Ticket redemption against the CAS server, one module per protocol version.

pub mod cas1;
pub mod cas2;

use serde::{Deserialize, Serialize};

use crate::backchannel::Backchannel;
use crate::error::Result;
use crate::identity::Identity;
use crate::options::CasAuthenticationOptions;
use crate::properties::AuthenticationProperties;
use crate::provider::AuthenticatedContext;

/// Outcome of the callback: an identity, or none when the ticket was refused.
#[derive(Debug, Clone)]
pub struct AuthenticationTicket {
    pub identity: Option<Identity>,
    pub properties: AuthenticationProperties,
}

impl AuthenticationTicket {
    pub fn rejected(properties: AuthenticationProperties) -> Self {
        AuthenticationTicket { identity: None, properties }
    }
}

/// Protocol used to validate tickets, picked at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketValidator {
    /// `/validate`, plaintext `yes`/`no`.
    Cas1,
    /// `/serviceValidate`, XML with attributes.
    #[default]
    Cas2,
}

impl TicketValidator {
    /// `service` must already be percent-encoded, exactly as it was sent to `/login`.
    pub async fn validate(
        self,
        options: &CasAuthenticationOptions,
        backchannel: &dyn Backchannel,
        ticket: &str,
        service: &str,
        properties: AuthenticationProperties,
    ) -> Result<AuthenticationTicket> {
        match self {
            TicketValidator::Cas1 => cas1::validate(options, backchannel, ticket, service, properties).await,
            TicketValidator::Cas2 => cas2::validate(options, backchannel, ticket, service, properties).await,
        }
    }
}

fn validation_url(options: &CasAuthenticationOptions, endpoint: &str, service: &str, ticket: &str) -> String {
    format!(
        "{}/{endpoint}?service={service}&ticket={}",
        options.server_url_base,
        urlencoding::encode(ticket)
    )
}

/// Gives the provider a chance to amend the identity before it is handed back.
async fn authenticated(
    options: &CasAuthenticationOptions,
    identity: Identity,
    properties: AuthenticationProperties,
) -> AuthenticationTicket {
    let mut context = AuthenticatedContext { identity, properties };
    options.provider.authenticated(&mut context).await;
    AuthenticationTicket {
        identity: Some(context.identity),
        properties: context.properties,
    }
}
