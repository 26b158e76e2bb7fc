//! Machine-wide state: standard directories, the config file and the
//! archive download cache.

pub mod cache;
pub mod config;
pub mod utils;
