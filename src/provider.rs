//! Extension points invoked during the handshake.

use rocket::http::Status;

use crate::identity::Identity;
use crate::properties::AuthenticationProperties;

/// Challenge is about to redirect the user agent to the CAS login page.
pub struct ApplyRedirectContext<'a> {
    /// Login URL, rewrite it to add parameters.
    pub redirect_uri: String,
    pub properties: &'a AuthenticationProperties,
}

/// A ticket was validated and an identity built.
pub struct AuthenticatedContext {
    pub identity: Identity,
    pub properties: AuthenticationProperties,
}

/// Response written by a hook that finished the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResponse {
    pub status: Status,
    pub body: String,
}

/// The callback is about to sign in and redirect.
pub struct ReturnEndpointContext {
    /// `None` when the ticket was rejected or could not be validated.
    pub identity: Option<Identity>,
    pub properties: AuthenticationProperties,
    pub redirect_uri: Option<String>,
    pub sign_in_as: Option<String>,
    response: Option<HookResponse>,
}

impl ReturnEndpointContext {
    pub(crate) fn new(
        identity: Option<Identity>,
        properties: AuthenticationProperties,
        redirect_uri: Option<String>,
        sign_in_as: Option<String>,
    ) -> Self {
        ReturnEndpointContext {
            identity,
            properties,
            redirect_uri,
            sign_in_as,
            response: None,
        }
    }

    /// Finish the request with this response. No sign-in or redirect follows.
    pub fn complete(&mut self, status: Status, body: impl Into<String>) {
        self.response = Some(HookResponse { status, body: body.into() });
    }

    pub fn is_request_completed(&self) -> bool {
        self.response.is_some()
    }

    pub(crate) fn take_response(&mut self) -> Option<HookResponse> {
        self.response.take()
    }
}

/// Callbacks giving the application control over the handshake. Every method
/// defaults to doing nothing.
#[rocket::async_trait]
pub trait CasAuthenticationProvider: Send + Sync {
    /// Called synchronously while the challenge is built, so it can't await.
    /// Do I/O in the other two hooks.
    fn apply_redirect(&self, _context: &mut ApplyRedirectContext<'_>) {}

    async fn authenticated(&self, _context: &mut AuthenticatedContext) {}

    async fn return_endpoint(&self, _context: &mut ReturnEndpointContext) {}
}

pub struct DefaultProvider;

impl CasAuthenticationProvider for DefaultProvider {}
