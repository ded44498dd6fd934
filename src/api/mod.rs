pub mod request;
pub mod response;
pub mod routes;

pub use request::CallRequest;
pub use response::ErrorResponse;
pub use routes::{create_router, AppState};
