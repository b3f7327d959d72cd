//! Provider hooks shaping the handshake.
mod common;

use common::*;
use rocket::http::{Cookie, Header, Status};
use rocket_cas::{
    ApplyRedirectContext, AuthenticatedContext, CasAuthentication, CasAuthenticationProvider, Claim,
    ReturnEndpointContext,
};

struct AddsParameter;

impl CasAuthenticationProvider for AddsParameter {
    fn apply_redirect(&self, context: &mut ApplyRedirectContext<'_>) {
        context.redirect_uri.push_str("&custom=test");
    }
}

#[rocket::async_test]
async fn apply_redirect_rewrites_login_url() {
    let fairing = CasAuthentication::fairing()
        .config(config())
        .provider(AddsParameter)
        .backchannel(RecordingBackchannel::ok(""));
    let client = client(fairing).await;

    let response = client.get("/challenge").header(Header::new("Host", "example.com")).dispatch().await;
    assert_eq!(response.status(), Status::Found);
    let location = response.headers().get_one("Location").unwrap();
    assert!(location.starts_with("https://cas-dev.tamu.edu/cas/login?service="), "{location}");
    assert!(location.ends_with("&custom=test"), "{location}");
}

struct AnswersItself;

#[rocket::async_trait]
impl CasAuthenticationProvider for AnswersItself {
    async fn return_endpoint(&self, context: &mut ReturnEndpointContext) {
        let user = context.identity.as_ref().and_then(|identity| identity.name()).unwrap_or("nobody");
        let body = format!("welcome {user}");
        context.complete(Status::Accepted, body);
    }
}

#[rocket::async_test]
async fn return_endpoint_can_complete_the_request() {
    let backchannel = RecordingBackchannel::ok(CAS2_SUCCESS);
    let fairing = CasAuthentication::fairing()
        .config(config())
        .provider(AnswersItself)
        .backchannel(backchannel.clone());
    let client = client(fairing).await;
    let state = protected_state("https://example.com/me", "c0rr");

    let response = client.get(callback_uri(&state, "ST-1")).cookie(Cookie::new(CORRELATION, "c0rr")).dispatch().await;
    assert_eq!(response.status(), Status::Accepted);
    assert!(response.headers().get_one("Location").is_none());
    assert!(response.cookies().get("token").is_none());
    assert_eq!(response.into_string().await.as_deref(), Some("welcome testuser"));
    assert_eq!(backchannel.calls().len(), 1);
}

struct SendsHome;

#[rocket::async_trait]
impl CasAuthenticationProvider for SendsHome {
    async fn return_endpoint(&self, context: &mut ReturnEndpointContext) {
        context.redirect_uri = Some(String::from("https://example.com/home"));
    }
}

#[rocket::async_test]
async fn return_endpoint_can_change_the_destination() {
    let fairing = CasAuthentication::fairing()
        .config(config())
        .provider(SendsHome)
        .backchannel(RecordingBackchannel::ok(CAS2_SUCCESS));
    let client = client(fairing).await;
    let state = protected_state("https://example.com/me", "c0rr");

    let response = client.get(callback_uri(&state, "ST-1")).cookie(Cookie::new(CORRELATION, "c0rr")).dispatch().await;
    assert_eq!(response.status(), Status::Found);
    assert_eq!(response.headers().get_one("Location"), Some("https://example.com/home"));
    assert!(response.cookies().get("token").is_some());

    // Failures are reported at the new destination too.
    let response = client.get(callback_uri(&state, "ST-1")).cookie(Cookie::new(CORRELATION, "other")).dispatch().await;
    assert_eq!(response.headers().get_one("Location"), Some("https://example.com/home?error=access_denied"));
}

struct AddsRole;

#[rocket::async_trait]
impl CasAuthenticationProvider for AddsRole {
    async fn authenticated(&self, context: &mut AuthenticatedContext) {
        context.identity.add_claim(Claim::new("role", "staff"));
    }
}

#[rocket::async_test]
async fn authenticated_hook_adds_claims_to_the_session() {
    let fairing = CasAuthentication::fairing()
        .config(config())
        .provider(AddsRole)
        .backchannel(RecordingBackchannel::ok(CAS2_SUCCESS));
    let client = client(fairing).await;
    let state = protected_state("https://example.com/me", "c0rr");

    let response = client.get(callback_uri(&state, "ST-1")).cookie(Cookie::new(CORRELATION, "c0rr")).dispatch().await;
    let token = response.cookies().get("token").unwrap().value().to_string();

    let body = client.get("/me").cookie(Cookie::new("token", token)).dispatch().await.into_string().await.unwrap();
    assert!(body.ends_with("role=staff\n"), "{body}");
}

struct ClearsDestination;

#[rocket::async_trait]
impl CasAuthenticationProvider for ClearsDestination {
    async fn return_endpoint(&self, context: &mut ReturnEndpointContext) {
        context.redirect_uri = None;
    }
}

#[rocket::async_test]
async fn signs_in_even_without_a_destination() {
    let fairing = CasAuthentication::fairing()
        .config(config())
        .provider(ClearsDestination)
        .backchannel(RecordingBackchannel::ok(CAS2_SUCCESS));
    let client = client(fairing).await;
    let state = protected_state("https://example.com/me", "c0rr");

    let response = client.get(callback_uri(&state, "ST-1")).cookie(Cookie::new(CORRELATION, "c0rr")).dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert!(response.headers().get_one("Location").is_none());
    assert!(response
        .headers()
        .get("Set-Cookie")
        .any(|cookie| cookie.starts_with("cas.correlation.CAS=;")));
    let token = response.cookies().get("token").unwrap().value().to_string();

    let body = client.get("/me").cookie(Cookie::new("token", token)).dispatch().await.into_string().await.unwrap();
    assert!(body.contains("uid=5c62dae8b85c9dfa1417a43ceffc5926\n"), "{body}");

    // A rejected ticket leaves nothing to sign in.
    let response = client.get(callback_uri(&state, "ST-1")).cookie(Cookie::new(CORRELATION, "other")).dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert!(response.cookies().get("token").is_none());
}
