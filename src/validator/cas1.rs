//! CAS 1.0 `/validate`: the body is `yes\n<user>\n` or `no\n`.

use crate::backchannel::Backchannel;
use crate::error::Result;
use crate::identity::IdentityBuilder;
use crate::options::CasAuthenticationOptions;
use crate::properties::AuthenticationProperties;

use super::AuthenticationTicket;

pub async fn validate(
    options: &CasAuthenticationOptions,
    backchannel: &dyn Backchannel,
    ticket: &str,
    service: &str,
    properties: AuthenticationProperties,
) -> Result<AuthenticationTicket> {
    let url = super::validation_url(options, "validate", service, ticket);
    let body = backchannel.get(&url).await?;

    let Some(user) = parse_response(&body) else {
        tracing::debug!("CAS 1.0 ticket rejected");
        return Ok(AuthenticationTicket::rejected(properties));
    };

    // No attribute payload in 1.0, so no name identifier override either.
    let identity = IdentityBuilder::new(&options.authentication_type, &options.name_claim_type, user).build()?;
    Ok(super::authenticated(options, identity, properties).await)
}

/// The validated user name, or `None` if the server said no.
pub fn parse_response(body: &str) -> Option<&str> {
    let mut lines = body.split('\n');
    match (lines.next(), lines.next()) {
        (Some("yes"), Some(user)) => {
            let user = user.trim();
            (!user.is_empty()).then_some(user)
        }
        _ => None,
    }
}
