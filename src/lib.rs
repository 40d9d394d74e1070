#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_lossless)]

//! # Taskpulse
//!
//! Role-based project and task tracking service with AI-assisted scoring and
//! risk analysis.
//!
//! Employees work their assigned tasks and submit evidence; project managers
//! and hr review the work, plan projects and watch workload. Hosted models
//! (Gemini, then Groq) score submitted evidence, break tasks into subtasks
//! and flag deadline risk, with fixed fallbacks when every provider fails.
//!
//! ## Layers
//!
//! - [`core`] - domain model, task lifecycle rules and configuration
//! - [`ai`] - provider chain, reply parsing and typed analyses
//! - [`store`] - SQLite persistence
//! - [`upload`] - evidence file storage
//! - [`service`] - application operations with role checks
//! - [`server`] - the JSON HTTP API
//!
//! ## Quick Start
//!
//! ```bash
//! # Configure a provider and start the API
//! export GEMINI_API_KEY=...
//! taskpulse serve --port 8080
//!
//! # Scan open tasks for deadline risk
//! taskpulse scan
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod ai;
pub mod app;
pub mod core;
pub mod server;
pub mod service;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use ai::{AIError, AIGateway, Analyzer, TextCompletionProvider};
pub use app::App;
pub use core::{Actor, Config, Project, Role, Task, TaskStatus, User};
pub use service::{ServiceError, ServiceResult};
pub use store::{Store, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "taskpulse";
