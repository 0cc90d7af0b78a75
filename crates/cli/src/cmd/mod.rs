//! CLI command implementations

pub mod add;
pub mod backup;
pub mod config;
pub mod init;
pub mod log;
pub mod map;
pub mod recover;
pub mod rm;
pub mod setting;
pub mod show;
pub mod verify;
