use std::io::Cursor;

use rocket::http::{Header, Status};
use rocket::response::Responder;
use rocket::{get, launch, routes, Request, Response};
use rocket_cas::{sign_out_cookie, CasAuthentication, CasChallenge, CasUser, Identity, RequestOrigin};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    authentication_type: &'a str,
    name: Option<&'a str>,
    name_identifier: Option<&'a str>,
    claims: Vec<(&'a str, &'a str)>,
}

pub struct ClaimsResponse(Identity);

impl <'r, 'o: 'r> Responder<'r, 'o> for ClaimsResponse {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let identity = &self.0;
        let claims = Claims {
            authentication_type: &identity.authentication_type,
            name: identity.name(),
            name_identifier: identity.name_identifier(),
            claims: identity.claims().iter().map(|c| (c.claim_type.as_str(), c.value.as_str())).collect(),
        };
        let body = serde_json::to_string(&claims).unwrap_or_default();
        let mut response = Response::build();
        let response = response.status(Status::Ok)
            .header(Header::new("Content-Type", "application/json"))
            .sized_body(body.len(), Cursor::new(body));
        Ok(response.finalize())
    }
}

pub struct LogoutResponse {
    cookie: String,
}

impl <'r, 'o: 'r> Responder<'r, 'o> for LogoutResponse {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let body = "Successfully logged out.";
        let mut response = Response::build();
        let response = response.status(Status::Ok)
            .header(Header::new("Content-Type", "text/plain"))
            .header(Header::new("Set-Cookie", self.cookie))
            .sized_body(body.len(), Cursor::new(body));
        Ok(response.finalize())
    }
}

#[get("/")]
fn index(handler: &rocket::State<rocket_cas::CasAuthenticationHandler>) -> String {
    format!("Sign in with {} at /login", handler.options().caption)
}

#[get("/world")]
fn world() -> &'static str {
    "Hello, world!"
}

#[get("/me")]
fn me(user: CasUser) -> ClaimsResponse {
    ClaimsResponse(user.0)
}

#[get("/login?<next>&<renew>")]
fn login(next: Option<String>, renew: Option<bool>) -> CasChallenge {
    let challenge = CasChallenge::new().redirect_to(next.unwrap_or_else(|| String::from("/me")));
    if renew.unwrap_or(false) {
        challenge.renew()
    } else {
        challenge
    }
}

#[get("/logout")]
fn logout(handler: &rocket::State<rocket_cas::CasAuthenticationHandler>, origin: RequestOrigin) -> LogoutResponse {
    LogoutResponse {
        cookie: sign_out_cookie(handler.options(), origin.is_secure()),
    }
}

#[launch]
fn rocket() -> _ {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    rocket::build()
        .attach(CasAuthentication::fairing())
        .mount("/", routes![index, world, me, login, logout])
}
