pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod logging;
pub mod osf;
pub mod output;
pub mod presence;
pub mod store;
