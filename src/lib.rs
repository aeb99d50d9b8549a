#![doc = include_str!("../README.md")]

/// Build-backend adapter writing `PKG-INFO`.
pub mod backend;
/// Command implementations and argument types.
pub mod commands;
/// Versioning configuration resolution.
pub mod config;
/// Git repository inspection.
pub mod git;
/// Version parsing and rendering.
///
/// # Example: Using in a build script
///
/// ```no_run
/// use git_versioning::get_version;
///
/// match get_version(".") {
///     Ok(version) => println!("version: {version}"),
///     Err(e) => eprintln!("invalid versioning config: {e:#}"),
/// }
/// ```
pub mod version;

pub use version::get_version;
