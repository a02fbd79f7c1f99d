// Public API - what other modules can use
pub use handlers::{login, logout, protected};
pub use middleware::require_auth;
pub use types::{AuthenticatedUser, TokenClaims};

// Internal modules
mod handlers;
mod middleware;
pub mod password;
pub mod revocation;
pub mod service;
pub mod token;
pub mod types;
