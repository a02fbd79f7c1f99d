pub mod requests;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use requests::TestResponse;
#[allow(unused_imports)]
pub use setup::{LoggedInUser, TestApp, TestAppBuilder};
