//! Command implementations.

mod backend;
mod show_config;
mod version;

pub use backend::{
    BackendArgs,
    backend,
};
pub use show_config::{
    ShowConfigArgs,
    show_config,
};
pub use version::{
    VersionArgs,
    version,
};
