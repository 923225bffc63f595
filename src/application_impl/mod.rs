mod auth_backend_fake;
mod refresh_coordinator;
mod refresh_executor;
mod request_decorator;
mod response_interceptor;
mod session_client;

pub use auth_backend_fake::*;
pub use refresh_coordinator::*;
pub use refresh_executor::*;
pub use request_decorator::*;
pub use response_interceptor::*;
pub use session_client::*;
