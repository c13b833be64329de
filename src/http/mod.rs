//! HTTP surface for the site front end

mod protocol;
mod server;

pub use protocol::{ContactResponse, ErrorResponse, HealthResponse, ValidationResponse};
pub use server::{build_router, AppState, Server};
