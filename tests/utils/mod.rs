pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use setup::{message, tag_of, FailingNotifier, TestSetup, TestSetupBuilder};
