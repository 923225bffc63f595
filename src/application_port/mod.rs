mod endpoints;
mod refresh;
mod session_api;

pub use endpoints::*;
pub use refresh::*;
pub use session_api::*;
