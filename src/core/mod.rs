//! Core types and rules for Taskpulse.
//!
//! This module contains the domain records, identifier handling, the task
//! lifecycle rules and configuration.

mod config;
mod ids;
mod lifecycle;
mod model;

pub use config::{
    AiConfig, CloudinaryConfig, Config, DatabaseConfig, LocalStorageConfig, ProviderConfig,
    ServerConfig, StorageBackend, StorageConfig,
};
pub use ids::{is_valid_id, new_id};
pub use lifecycle::{
    assignee_change, plan_update, record_evidence, resolve_status, AssigneeChange, FieldPolicy,
    Lateness, LifecycleError, TaskChanges, TaskField, TaskPatch,
};
pub use model::{
    client_time, Actor, Evidence, Priority, Project, ProjectStatus, RiskLevel, Role, Task,
    TaskStatus, UnknownVariant, User, UserStatus,
};
