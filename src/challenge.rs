//! Turning a 401 into a redirect to the CAS login page.

use std::io::Cursor;
use std::sync::Mutex;

use rocket::http::{Header, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::Responder;
use rocket::{catch, Request, Response};

use crate::handler::{CasAuthenticationHandler, Challenge};
use crate::options::{AuthenticationMode, CasAuthenticationOptions};
use crate::properties::{AuthenticationProperties, RENEW};

/// Scheme and host the user agent used to reach us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        RequestOrigin { scheme: scheme.into(), host: host.into() }
    }

    /// The host comes from `Host`. `X-Forwarded-Proto` is only read when
    /// `trust_forwarded_proto` is set, otherwise the scheme is `default_scheme`.
    pub fn of(req: &Request<'_>, default_scheme: &str, trust_forwarded_proto: bool) -> Self {
        let scheme = req
            .headers()
            .get_one("X-Forwarded-Proto")
            .filter(|_| trust_forwarded_proto)
            .and_then(|proto| proto.split(',').next())
            .map(|proto| proto.trim().to_ascii_lowercase())
            .filter(|proto| !proto.is_empty())
            .unwrap_or_else(|| default_scheme.to_string());
        let host = req
            .host()
            .map(|host| host.to_string())
            .unwrap_or_else(|| String::from("localhost"));
        RequestOrigin { scheme, host }
    }

    pub fn of_options(req: &Request<'_>, options: &CasAuthenticationOptions) -> Self {
        RequestOrigin::of(req, &options.default_scheme, options.trust_forwarded_proto)
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path_and_query)
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestOrigin {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let origin = match req.rocket().state::<CasAuthenticationHandler>() {
            Some(handler) => RequestOrigin::of_options(req, handler.options()),
            None => RequestOrigin::of(req, "https", false),
        };
        Outcome::Success(origin)
    }
}

/// Challenge registered for the current request, picked up by the 401 catcher.
struct PendingChallenge(Mutex<Option<AuthenticationProperties>>);

pub(crate) fn request_challenge(req: &Request<'_>, properties: AuthenticationProperties) {
    let pending = req.local_cache(|| PendingChallenge(Mutex::new(None)));
    if let Ok(mut slot) = pending.0.lock() {
        *slot = Some(properties);
    }
}

fn take_challenge(req: &Request<'_>) -> Option<AuthenticationProperties> {
    let pending = req.local_cache(|| PendingChallenge(Mutex::new(None)));
    pending.0.lock().ok().and_then(|mut slot| slot.take())
}

/// Responder asking for a CAS login. Answers 401, which the catcher turns
/// into the redirect.
///
/// ```no_run
/// # use rocket::get;
/// use rocket_cas::CasChallenge;
///
/// #[get("/login")]
/// fn login() -> CasChallenge {
///     CasChallenge::new().redirect_to("/me")
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CasChallenge {
    properties: AuthenticationProperties,
}

impl CasChallenge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(properties: AuthenticationProperties) -> Self {
        CasChallenge { properties }
    }

    /// Where to go after login. Defaults to the challenged URL.
    pub fn redirect_to(mut self, uri: impl Into<String>) -> Self {
        self.properties.redirect_uri = Some(uri.into());
        self
    }

    /// Ask the CAS server to authenticate again even with a live SSO session.
    pub fn renew(mut self) -> Self {
        self.properties.insert(RENEW, "true");
        self
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for CasChallenge {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        request_challenge(req, self.properties);
        Err(Status::Unauthorized)
    }
}

pub enum ChallengeResponse {
    Redirect(Challenge),
    Unauthorized,
    Failed,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ChallengeResponse {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        match self {
            ChallengeResponse::Redirect(challenge) => Ok(Response::build()
                .status(Status::Found)
                .header(Header::new("Location", challenge.location))
                .header(Header::new("Set-Cookie", challenge.correlation_cookie))
                .finalize()),
            ChallengeResponse::Unauthorized => {
                let body = "Unauthorized";
                Ok(Response::build()
                    .status(Status::Unauthorized)
                    .header(Header::new("Content-Type", "text/plain"))
                    .sized_body(body.len(), Cursor::new(body))
                    .finalize())
            }
            ChallengeResponse::Failed => Ok(Response::build().status(Status::InternalServerError).finalize()),
        }
    }
}

fn challenge_properties(req: &Request<'_>, options: &CasAuthenticationOptions) -> Option<AuthenticationProperties> {
    match (take_challenge(req), options.authentication_mode) {
        (Some(properties), _) => Some(properties),
        (None, AuthenticationMode::Active) => Some(AuthenticationProperties::new()),
        (None, AuthenticationMode::Passive) => None,
    }
}

#[catch(401)]
pub fn unauthorized(req: &Request<'_>) -> ChallengeResponse {
    let Some(handler) = req.rocket().state::<CasAuthenticationHandler>() else {
        return ChallengeResponse::Unauthorized;
    };
    let options = handler.options();
    let Some(properties) = challenge_properties(req, options) else {
        return ChallengeResponse::Unauthorized;
    };

    let origin = RequestOrigin::of_options(req, options);
    match handler.apply_challenge(&origin, &req.uri().to_string(), properties) {
        Ok(challenge) => ChallengeResponse::Redirect(challenge),
        Err(e) => {
            tracing::error!(error = %e, "can't build CAS challenge");
            ChallengeResponse::Failed
        }
    }
}
