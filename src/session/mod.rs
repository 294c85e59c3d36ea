pub mod api_session;
pub mod auth;
pub mod dto;
pub mod error;
pub mod jwt;
pub mod transport;
pub mod urls;

pub use api_session::ApiSession;
pub use auth::AuthService;
pub use error::{ActionFailure, ActionResult, ApiError};
pub use transport::ReqwestTransport;
pub use urls::*;
