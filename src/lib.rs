//! Synchronization core of a terminal code-editor shell: the explorer tree,
//! folder expansion, open tabs and a file-system watcher, kept consistent
//! with what is on disk through a [`bridge::HostBridge`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod fs;
pub mod language;
pub mod notifications;
pub mod settings;
pub mod tabs;
pub mod workspace;
