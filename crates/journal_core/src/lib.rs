pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;
