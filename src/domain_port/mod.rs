// store

mod credential_store;

pub use credential_store::*;

// transport

mod http_transport;

pub use http_transport::*;
