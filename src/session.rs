//! Local session established after a successful callback: a signed cookie
//! holding the identity.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::challenge::request_challenge;
use crate::error::{CasError, Result};
use crate::handler::CasAuthenticationHandler;
use crate::identity::Identity;
use crate::options::CasAuthenticationOptions;
use crate::properties::AuthenticationProperties;

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        SessionKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    exp: usize, // Expiration time (as UTC timestamp)
    iat: usize, // Issued at (as UTC timestamp)
    identity: Identity,
}

pub(crate) fn cookie_header(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}")
}

/// `Set-Cookie` value carrying a fresh session for `identity`.
pub fn sign_in_cookie(options: &CasAuthenticationOptions, identity: &Identity, secure: bool) -> Result<String> {
    let utc_now = chrono::Utc::now().timestamp() as usize;
    let max_age = options.session_lifetime.as_secs();
    let claims = SessionClaims {
        exp: utc_now + max_age as usize,
        iat: utc_now,
        identity: identity.clone(),
    };
    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &options.session_keys.encoding)?;
    Ok(cookie_header(&options.session_cookie, &token, max_age, secure))
}

/// `Set-Cookie` value removing the session.
pub fn sign_out_cookie(options: &CasAuthenticationOptions, secure: bool) -> String {
    cookie_header(&options.session_cookie, "", 0, secure)
}

pub fn verify(options: &CasAuthenticationOptions, token: &str) -> Result<Identity> {
    let data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &options.session_keys.decoding,
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims.identity)
}

/// Request guard for routes behind the CAS login. Without a valid session the
/// request fails with 401 and a challenge back to the current URL.
pub struct CasUser(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CasUser {
    type Error = CasError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(handler) = req.rocket().state::<CasAuthenticationHandler>() else {
            return Outcome::Error((
                Status::InternalServerError,
                CasError::Config(String::from("CAS fairing is not attached")),
            ));
        };
        let options = handler.options();

        let error = match req.cookies().get(&options.session_cookie) {
            Some(cookie) => match verify(options, cookie.value()) {
                Ok(identity) => return Outcome::Success(CasUser(identity)),
                Err(e) => e,
            },
            None => CasError::NotAuthenticated,
        };

        tracing::debug!(error = %error, "no valid session, challenging");
        request_challenge(req, AuthenticationProperties::new());
        Outcome::Error((Status::Unauthorized, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{claim_types, IdentityBuilder};
    use crate::options::CasConfig;

    fn options() -> CasAuthenticationOptions {
        CasAuthenticationOptions::from_config(CasConfig {
            server_url_base: String::from("https://cas.example.com/cas"),
            session_secret: Some(String::from("session-secret")),
            ..CasConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn sign_in_cookie_verifies() {
        let options = options();
        let identity = IdentityBuilder::new("Cookies", claim_types::NAME, "jdoe")
            .attribute("mail", "jdoe@example.com")
            .build()
            .unwrap();

        let cookie = sign_in_cookie(&options, &identity, true).unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.ends_with("; Max-Age=28800; Secure"));

        let token = cookie.trim_start_matches("token=").split(';').next().unwrap();
        assert_eq!(verify(&options, token).unwrap(), identity);
        assert!(verify(&options, &format!("{token}x")).is_err());
    }

    #[test]
    fn sign_out_expires_cookie() {
        assert_eq!(
            sign_out_cookie(&options(), false),
            "token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
