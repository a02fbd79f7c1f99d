// Library crate for the authpost server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod post;
pub mod record_id;
pub mod router;
pub mod session;
pub mod shared;
pub mod user;

// Re-export commonly used types for easier access in tests
pub use config::AppConfig;
pub use record_id::RecordId;
pub use router::build_router;
pub use session::AuthenticatedUser;
pub use shared::{AppError, AppState};
