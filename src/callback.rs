use std::io::Cursor;

use rocket::http::uri::Origin;
use rocket::http::{CookieJar, Header, Status};
use rocket::response::Responder;
use rocket::{get, Request, Response, State};

use crate::challenge::RequestOrigin;
use crate::handler::{CallbackQuery, CasAuthenticationHandler, ReturnPathResponse};
use crate::provider::HookResponse;
use crate::session::{cookie_header, sign_in_cookie};

pub enum CallbackResponse {
    Failed,
    Redirect { location: String, cookies: Vec<String> },
    Completed { response: HookResponse, cookies: Vec<String> },
    /// Nowhere to send the user agent. Still carries the session cookie.
    NotFound { cookies: Vec<String> },
}

impl<'r, 'o: 'r> Responder<'r, 'o> for CallbackResponse {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let mut response = Response::build();
        match self {
            CallbackResponse::Failed => {
                response.status(Status::InternalServerError);
            }
            CallbackResponse::Redirect { location, cookies } => {
                response.status(Status::Found)
                    .header(Header::new("Location", location));
                for cookie in cookies {
                    response.header_adjoin(Header::new("Set-Cookie", cookie));
                }
            }
            CallbackResponse::Completed { response: hook, cookies } => {
                response.status(hook.status)
                    .header(Header::new("Content-Type", "text/plain"))
                    .sized_body(hook.body.len(), Cursor::new(hook.body));
                for cookie in cookies {
                    response.header_adjoin(Header::new("Set-Cookie", cookie));
                }
            }
            CallbackResponse::NotFound { cookies } => {
                response.status(Status::NotFound);
                for cookie in cookies {
                    response.header_adjoin(Header::new("Set-Cookie", cookie));
                }
            }
        }
        Ok(response.finalize())
    }
}

/// Mounted at the configured callback path. The CAS server sends the user
/// agent here with `state` and `ticket`.
#[get("/")]
pub async fn callback(
    handler: &State<CasAuthenticationHandler>,
    origin: RequestOrigin,
    uri: &Origin<'_>,
    cookies: &CookieJar<'_>,
) -> CallbackResponse {
    let options = handler.options();
    let raw_uri = uri.to_string();
    let query = CallbackQuery::parse(raw_uri.split_once('?').map(|(_, query)| query));

    let correlation_key = options.correlation_key();
    let correlation = cookies.get(&correlation_key).map(|c| c.value().to_string());

    let return_path = handler.invoke_return_path(&origin, &query, correlation.as_deref()).await;

    // The correlation token is single use whatever happened.
    let mut set_cookies = vec![cookie_header(&correlation_key, "", 0, origin.is_secure())];
    if let Some(identity) = &return_path.sign_in {
        match sign_in_cookie(options, identity, origin.is_secure()) {
            Ok(cookie) => set_cookies.push(cookie),
            Err(e) => {
                tracing::error!(error = %e, "can't issue session");
                return CallbackResponse::Failed;
            }
        }
    }

    match return_path.response {
        ReturnPathResponse::InvalidState => CallbackResponse::Failed,
        ReturnPathResponse::Redirect(location) => CallbackResponse::Redirect { location, cookies: set_cookies },
        ReturnPathResponse::Completed(response) => CallbackResponse::Completed { response, cookies: set_cookies },
        ReturnPathResponse::Pending => CallbackResponse::NotFound { cookies: set_cookies },
    }
}
