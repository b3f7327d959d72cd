//! CAS (Central Authentication Service) login for Rocket.
//!
//! Attach [`CasAuthentication`] and guard routes with [`CasUser`]. Unauthenticated
//! requests get redirected to the CAS server; the user agent comes back on the
//! callback path with a service ticket, which is validated over the backchannel
//! (CAS 1.0 `/validate` or CAS 2.0 `/serviceValidate`) and turned into a local
//! session cookie.
//!
//! Settings are read from the `cas` key of the Rocket configuration, see
//! [`CasConfig`].

pub mod backchannel;
pub mod callback;
pub mod challenge;
pub mod error;
pub mod handler;
pub mod identity;
pub mod options;
pub mod properties;
pub mod provider;
pub mod session;
pub mod state;
pub mod validator;

use std::sync::Arc;

use rocket::fairing::{self, Fairing, Info, Kind};
use rocket::http::uri::Origin;
use rocket::{catchers, routes, Build, Rocket};

pub use crate::backchannel::{Backchannel, IsahcBackchannel};
pub use crate::challenge::{CasChallenge, RequestOrigin};
pub use crate::error::CasError;
pub use crate::handler::CasAuthenticationHandler;
pub use crate::identity::{claim_types, Claim, Identity, IdentityBuilder};
pub use crate::options::{AuthenticationMode, CasAuthenticationOptions, CasConfig};
pub use crate::properties::AuthenticationProperties;
pub use crate::provider::{
    ApplyRedirectContext, AuthenticatedContext, CasAuthenticationProvider, HookResponse, ReturnEndpointContext,
};
pub use crate::session::{sign_out_cookie, CasUser};
pub use crate::state::{JwtStateFormat, SecureDataFormat};
pub use crate::validator::{AuthenticationTicket, TicketValidator};

/// Fairing installing the CAS handler: managed state, the callback route and
/// the 401 catcher.
///
/// The catcher replaces any other 401 catcher registered at `/`.
#[derive(Default)]
pub struct CasAuthentication {
    config: Option<CasConfig>,
    provider: Option<Arc<dyn CasAuthenticationProvider>>,
    state_format: Option<Arc<dyn SecureDataFormat>>,
    backchannel: Option<Arc<dyn Backchannel>>,
}

impl CasAuthentication {
    pub fn fairing() -> Self {
        Self::default()
    }

    /// Use these settings instead of the `cas` configuration key.
    pub fn config(mut self, config: CasConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn provider(mut self, provider: impl CasAuthenticationProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn state_format(mut self, state_format: impl SecureDataFormat + 'static) -> Self {
        self.state_format = Some(Arc::new(state_format));
        self
    }

    /// Defaults to an [`IsahcBackchannel`] honouring `backchannel_timeout`.
    pub fn backchannel(mut self, backchannel: impl Backchannel + 'static) -> Self {
        self.backchannel = Some(Arc::new(backchannel));
        self
    }

    fn handler(&self, rocket: &Rocket<Build>) -> Result<CasAuthenticationHandler, CasError> {
        let config = match &self.config {
            Some(config) => config.clone(),
            None => rocket
                .figment()
                .extract_inner::<CasConfig>("cas")
                .map_err(|e| CasError::Config(e.to_string()))?,
        };

        let mut options = CasAuthenticationOptions::from_config(config)?;
        if let Some(provider) = &self.provider {
            options.provider = Arc::clone(provider);
        }
        if let Some(state_format) = &self.state_format {
            options.state_format = Arc::clone(state_format);
        }

        let backchannel: Arc<dyn Backchannel> = match &self.backchannel {
            Some(backchannel) => Arc::clone(backchannel),
            None => Arc::new(IsahcBackchannel::new(options.backchannel_timeout)?),
        };

        Ok(CasAuthenticationHandler::new(options, backchannel))
    }
}

#[rocket::async_trait]
impl Fairing for CasAuthentication {
    fn info(&self) -> Info {
        Info {
            name: "CAS authentication",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> fairing::Result {
        let handler = match self.handler(&rocket) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(error = %e, "CAS authentication disabled");
                return Err(rocket);
            }
        };

        let callback_path = handler.options().callback_path.clone();
        let base = match Origin::parse_owned(callback_path.clone()) {
            Ok(base) if base.query().is_none() => base,
            _ => {
                tracing::error!(callback_path = %callback_path, "callback_path is not a valid route path");
                return Err(rocket);
            }
        };

        tracing::info!(
            server = %handler.options().server_url_base,
            protocol = ?handler.options().ticket_validator,
            callback_path = %callback_path,
            "CAS authentication enabled"
        );
        Ok(rocket
            .manage(handler)
            .mount(base, routes![callback::callback])
            .register("/", catchers![challenge::unauthorized]))
    }
}
