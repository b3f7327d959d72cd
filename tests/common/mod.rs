#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Duration;
use rocket::http::Status;
use rocket::local::asynchronous::Client;
use rocket::{get, routes};
use rocket_cas::{
    AuthenticationProperties, Backchannel, CasAuthentication, CasChallenge, CasConfig, CasError, CasUser,
    JwtStateFormat, SecureDataFormat,
};

pub const CAS_BASE: &str = "https://cas-dev.tamu.edu/cas";
pub const STATE_SECRET: &str = "integration-state-secret";
pub const CORRELATION: &str = "cas.correlation.CAS";

pub const CAS2_SUCCESS: &str = r#"<cas:serviceResponse xmlns:cas='http://www.yale.edu/tp/cas'>
    <cas:authenticationSuccess>
        <cas:user>testuser</cas:user>
        <cas:attributes>
            <cas:tamuEduPersonNetID>testuser</cas:tamuEduPersonNetID>
            <cas:tamuEduPersonUIN>111001111</cas:tamuEduPersonUIN>
            <cas:uid>5c62dae8b85c9dfa1417a43ceffc5926</cas:uid>
        </cas:attributes>
    </cas:authenticationSuccess>
</cas:serviceResponse>
"#;

pub const CAS2_FAILURE: &str = r#"<cas:serviceResponse xmlns:cas='http://www.yale.edu/tp/cas'>
    <cas:authenticationFailure code="INVALID_TICKET">Ticket ST-12345 not recognized</cas:authenticationFailure>
</cas:serviceResponse>
"#;

/// Fake CAS server: same answer for every call, URLs recorded.
#[derive(Clone)]
pub struct RecordingBackchannel {
    response: Result<String, u16>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingBackchannel {
    pub fn ok(body: &str) -> Self {
        RecordingBackchannel { response: Ok(body.to_string()), calls: Arc::default() }
    }

    pub fn failing(status: u16) -> Self {
        RecordingBackchannel { response: Err(status), calls: Arc::default() }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl Backchannel for RecordingBackchannel {
    async fn get(&self, url: &str) -> Result<String, CasError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.response.clone().map_err(CasError::BackchannelStatus)
    }
}

pub fn config() -> CasConfig {
    CasConfig {
        server_url_base: CAS_BASE.to_string(),
        state_secret: Some(STATE_SECRET.to_string()),
        session_secret: Some(String::from("integration-session-secret")),
        ..CasConfig::default()
    }
}

#[get("/challenge")]
fn challenge() -> CasChallenge {
    CasChallenge::new()
}

#[get("/renew")]
fn renew() -> CasChallenge {
    CasChallenge::new().renew().redirect_to("https://example.com/after")
}

#[get("/forbidden")]
fn forbidden() -> Status {
    Status::Unauthorized
}

#[get("/me")]
fn me(user: CasUser) -> String {
    user.0
        .claims()
        .iter()
        .map(|claim| format!("{}={}\n", claim.claim_type, claim.value))
        .collect()
}

pub async fn client(fairing: CasAuthentication) -> Client {
    let rocket = rocket::build()
        .attach(fairing)
        .mount("/", routes![challenge, renew, forbidden, me]);
    Client::untracked(rocket).await.expect("valid rocket instance")
}

/// State as the handler would have produced it, with the given correlation token.
pub fn protected_state(redirect_uri: &str, correlation: &str) -> String {
    let mut properties = AuthenticationProperties::with_redirect_uri(redirect_uri);
    properties.insert(CORRELATION, correlation);
    JwtStateFormat::new(STATE_SECRET.as_bytes(), Duration::minutes(15))
        .protect(&properties)
        .unwrap()
}

pub fn callback_uri(state: &str, ticket: &str) -> String {
    format!("/signin-cas?state={}&ticket={}", urlencoding::encode(state), urlencoding::encode(ticket))
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
