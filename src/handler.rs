//! The CAS handshake, independent of how Rocket delivers the request.
//!
//! A challenge builds a correlation token, protects the properties into the
//! `state` parameter and points the user agent at `<cas>/login`. The callback
//! unprotects `state`, checks the correlation token, redeems the ticket on the
//! backchannel and decides where the user agent goes next.
//!
//! Callback steps always run in the same order: state, correlation, ticket,
//! backchannel. The first failure stops the sequence.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::backchannel::Backchannel;
use crate::challenge::RequestOrigin;
use crate::error::{CasError, Result};
use crate::identity::Identity;
use crate::options::CasAuthenticationOptions;
use crate::properties::AuthenticationProperties;
use crate::provider::{ApplyRedirectContext, HookResponse, ReturnEndpointContext};
use crate::session::cookie_header;
use crate::state::random_token;
use crate::validator::AuthenticationTicket;

/// Redirect to the CAS login page, plus the correlation cookie to set with it.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub location: String,
    pub correlation_cookie: String,
}

/// `state` and `ticket` from the callback query. A parameter given more than
/// once counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub ticket: Option<String>,
}

impl CallbackQuery {
    pub fn parse(query: Option<&str>) -> Self {
        let mut states = Vec::new();
        let mut tickets = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "state" => states.push(value.into_owned()),
                "ticket" => tickets.push(value.into_owned()),
                _ => {}
            }
        }
        CallbackQuery {
            state: single(states),
            ticket: single(tickets),
        }
    }
}

fn single(mut values: Vec<String>) -> Option<String> {
    match values.len() {
        1 => values.pop(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnPathResponse {
    /// `state` missing or unreadable, the request fails with a server error.
    InvalidState,
    Redirect(String),
    /// The return endpoint hook answered the request itself.
    Completed(HookResponse),
    /// Nothing to redirect to and nobody answered. Sign-in still applies.
    Pending,
}

#[derive(Debug, Clone)]
pub struct ReturnPath {
    /// Identity to establish a local session for.
    pub sign_in: Option<Identity>,
    pub response: ReturnPathResponse,
}

pub struct CasAuthenticationHandler {
    options: CasAuthenticationOptions,
    backchannel: Arc<dyn Backchannel>,
}

impl CasAuthenticationHandler {
    pub fn new(options: CasAuthenticationOptions, backchannel: Arc<dyn Backchannel>) -> Self {
        CasAuthenticationHandler { options, backchannel }
    }

    pub fn options(&self) -> &CasAuthenticationOptions {
        &self.options
    }

    /// Callback URL carrying `state`, the `service` the CAS server sees.
    fn service_url(&self, origin: &RequestOrigin, state: &str) -> String {
        origin.url(&format!("{}?state={}", self.options.callback_path, urlencoding::encode(state)))
    }

    /// Builds the login redirect. `request_uri` is the path and query of the
    /// request being challenged, the default place to come back to.
    pub fn apply_challenge(
        &self,
        origin: &RequestOrigin,
        request_uri: &str,
        mut properties: AuthenticationProperties,
    ) -> Result<Challenge> {
        if properties.redirect_uri.as_deref().map_or(true, str::is_empty) {
            properties.redirect_uri = Some(origin.url(request_uri));
        }

        let correlation_key = self.options.correlation_key();
        let correlation_id = random_token(32);
        let correlation_cookie = cookie_header(
            &correlation_key,
            &correlation_id,
            self.options.state_lifetime.as_secs(),
            origin.is_secure(),
        );
        properties.insert(correlation_key, correlation_id);

        let state = self.options.state_format.protect(&properties)?;
        let service = self.service_url(origin, &state);

        let mut authorization_endpoint = format!(
            "{}/login?service={}",
            self.options.server_url_base,
            urlencoding::encode(&service)
        );
        if properties.renew() {
            authorization_endpoint.push_str("&renew=true");
        }

        let mut context = ApplyRedirectContext {
            redirect_uri: authorization_endpoint,
            properties: &properties,
        };
        self.options.provider.apply_redirect(&mut context);

        debug!(location = %context.redirect_uri, "redirecting to CAS login");
        Ok(Challenge {
            location: context.redirect_uri,
            correlation_cookie,
        })
    }

    /// `None` when `state` is missing or doesn't unprotect; every later
    /// failure yields a ticket without identity.
    pub async fn authenticate(
        &self,
        origin: &RequestOrigin,
        query: &CallbackQuery,
        correlation_cookie: Option<&str>,
    ) -> Option<AuthenticationTicket> {
        let Some(state) = query.state.as_deref() else {
            warn!("Invalid return state: missing");
            return None;
        };
        let Some(mut properties) = self.options.state_format.unprotect(state) else {
            warn!("Invalid return state");
            return None;
        };

        if let Err(e) = self.check_correlation(&mut properties, correlation_cookie) {
            warn!(error = %e, "rejecting callback");
            return Some(AuthenticationTicket::rejected(properties));
        }

        let Some(ticket) = query.ticket.as_deref().filter(|t| !t.is_empty()) else {
            warn!(error = %CasError::MissingTicket, "rejecting callback");
            return Some(AuthenticationTicket::rejected(properties));
        };

        // CAS matches the service against the one sent to /login, byte for byte.
        let service = urlencoding::encode(&self.service_url(origin, state)).into_owned();
        let validator = self.options.ticket_validator;
        match validator
            .validate(&self.options, self.backchannel.as_ref(), ticket, &service, properties.clone())
            .await
        {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                error!(error = %e, protocol = ?validator, "Authentication failed");
                Some(AuthenticationTicket::rejected(properties))
            }
        }
    }

    fn check_correlation(&self, properties: &mut AuthenticationProperties, cookie: Option<&str>) -> Result<()> {
        let expected = properties.remove(&self.options.correlation_key());
        match (cookie, expected) {
            (Some(cookie), Some(expected)) if !cookie.is_empty() && cookie == expected => Ok(()),
            _ => Err(CasError::CorrelationMismatch),
        }
    }

    /// Runs the whole callback: authenticate, return endpoint hook, then
    /// sign-in and redirect unless the hook answered.
    pub async fn invoke_return_path(
        &self,
        origin: &RequestOrigin,
        query: &CallbackQuery,
        correlation_cookie: Option<&str>,
    ) -> ReturnPath {
        let Some(mut ticket) = self.authenticate(origin, query, correlation_cookie).await else {
            warn!("Invalid return state, unable to redirect.");
            return ReturnPath { sign_in: None, response: ReturnPathResponse::InvalidState };
        };

        let redirect_uri = ticket.properties.redirect_uri.take();
        let mut context = ReturnEndpointContext::new(
            ticket.identity,
            ticket.properties,
            redirect_uri,
            self.options.sign_in_as.clone(),
        );
        self.options.provider.return_endpoint(&mut context).await;

        if let Some(response) = context.take_response() {
            return ReturnPath { sign_in: None, response: ReturnPathResponse::Completed(response) };
        }

        let authenticated = context.identity.is_some();
        let sign_in = match (context.sign_in_as, context.identity) {
            (Some(target), Some(identity)) if identity.authentication_type.eq_ignore_ascii_case(&target) => {
                Some(identity)
            }
            (Some(target), Some(identity)) => Some(identity.with_authentication_type(target)),
            _ => None,
        };

        let response = match context.redirect_uri {
            Some(uri) if authenticated => ReturnPathResponse::Redirect(uri),
            // Let the application know sign-in failed.
            Some(uri) => ReturnPathResponse::Redirect(add_query_string(&uri, "error", "access_denied")),
            None => ReturnPathResponse::Pending,
        };

        ReturnPath { sign_in, response }
    }
}

/// Appends `name=value` to `uri`, before any fragment.
pub fn add_query_string(uri: &str, name: &str, value: &str) -> String {
    let (base, fragment) = match uri.find('#') {
        Some(i) => uri.split_at(i),
        None => (uri, ""),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{separator}{}={}{fragment}",
        urlencoding::encode(name),
        urlencoding::encode(value)
    )
}
