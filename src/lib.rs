pub mod access;
pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod query;
pub mod session;
pub mod state;
pub mod storage;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use error::{PreviewError, Result};
