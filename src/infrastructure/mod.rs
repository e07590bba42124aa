//! Infrastructure layer: browser sessions, page parsing, storage,
//! configuration and logging.

pub mod config;
pub mod logging;
pub mod parsing;
pub mod session;
pub mod storage;
