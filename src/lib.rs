#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod cache_key;
pub mod client;
pub mod comment_tree;
pub mod config;
pub mod data;
pub mod fixtures;
pub mod format;
pub mod lemmy;
pub mod logging;
pub mod patch;
pub mod query;
pub mod session;
pub mod storage;
pub mod store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
