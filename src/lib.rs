pub mod adapters;
pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod resources;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::storage::LocalStorage;
pub use crate::client::{Client, DirectoryHttpClient, FetchContext};
pub use crate::config::SyncSettings;
pub use crate::core::{
    engine::{SyncEngine, SyncReport, TableRegistry},
    load::RowWriter,
};
pub use crate::utils::error::{Result, SyncError};
