//! HTTP layer of the parley messaging service.

pub mod auth;
pub mod conversations;
pub mod convert;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod pagination;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod users;

pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};
