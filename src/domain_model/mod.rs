mod credential;
mod http;
mod principal;
mod session;

pub use credential::*;
pub use http::*;
pub use principal::*;
pub use session::*;
