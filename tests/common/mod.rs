//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestLogsDir, DATE_1};
//!
//! #[tokio::test]
//! async fn test_export() {
//!     let logs = TestLogsDir::new();
//!     let service = logs.open_service();
//!     let id = service.create(DATE_1).unwrap();
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{wait_for, TestLogsDir};
