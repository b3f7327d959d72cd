use thiserror::Error;

/// Everything that can go wrong below the handler boundary.
///
/// A rejected ticket is not an error: validators return an
/// [`AuthenticationTicket`](crate::AuthenticationTicket) without identity for that.
#[derive(Debug, Error)]
pub enum CasError {
    #[error("invalid return state")]
    InvalidState,
    #[error("correlation cookie missing or mismatched")]
    CorrelationMismatch,
    #[error("missing ticket parameter")]
    MissingTicket,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("CAS unreachable: {0}")]
    Backchannel(#[from] isahc::Error),
    #[error("CAS answered with status {0}")]
    BackchannelStatus(u16),
    #[error("unreadable CAS response body: {0}")]
    BackchannelBody(#[from] std::io::Error),
    #[error("bad CAS response: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("unexpected CAS response: {0}")]
    UnexpectedResponse(String),
    #[error("identity attribute [{attribute}] not found for user: {user}")]
    MissingNameIdentifier { attribute: String, user: String },
    #[error("can't sign or verify token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("invalid CAS configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CasError>;
