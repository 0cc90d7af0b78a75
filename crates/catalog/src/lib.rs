//! Backup catalog and repository management
//!
//! This crate provides:
//! - Backup records (timestamp ids, bincode on disk)
//! - The Manager: history, active mappings, whole-snapshot persistence
//! - Repository layout and configuration
//! - Startup recovery and integrity verification

pub mod backup;
pub mod config;
pub mod layout;
pub mod manager;
pub mod recovery;

// Re-exports
pub use backup::Backup;
pub use config::Config;
pub use layout::{Layout, REPO_DIR};
pub use manager::{BackupSummary, Manager, ManagerState};
pub use recovery::{recover_on_startup, verify, IntegrityReport};

/// Result type for catalog operations
pub type Result<T> = anyhow::Result<T>;
