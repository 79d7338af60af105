pub mod config;
pub mod crypto;
pub mod logging;
pub mod storage;
pub mod utils;
