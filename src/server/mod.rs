//! Server startup: configuration, background refresh loops, serve loop.
//!
//! - `config`: configuration structures
//! - `loader`: configuration loading from files and environment
//! - `init`: state construction, router assembly and the run loop

pub mod config;
mod init;
mod loader;

pub use config::AppConfig;
pub use init::run;
pub use loader::load_config;
