//! Test utilities for the plant-shop QA suite.
//!
//! This crate provides the HTTP test client, per-scenario sessions with
//! guaranteed teardown, self-repairing data fixtures and failure
//! diagnostics. The Cucumber step library in `tests/bdd` is built on it.

pub mod browser;
pub mod cleanup;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fixtures;
pub mod logging;
pub mod response;
pub mod session;

pub use cleanup::{CleanupReport, CreatedResources};
pub use client::{ApiClient, AuthOutcome, Pagination, Role, SortDir};
pub use config::{Credentials, SuiteConfig, Viewport};
pub use error::{BrowserError, SetupError, SetupResult};
pub use fixtures::Fixtures;
pub use response::{normalize_list, HttpResult, ListBody, PageMeta, ResourceId};
pub use session::{RunContext, ScenarioInfo, ScenarioOutcome, Session, SessionState, TeardownReport};
