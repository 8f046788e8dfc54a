//! Testing utilities and mock implementations
//!
//! Stand-ins for the article source and the cache store so the feed handler
//! can be exercised without the content platform.

pub mod mocks;

pub use mocks::*;
