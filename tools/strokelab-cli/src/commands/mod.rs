pub mod analyze;
pub mod cache;
pub mod config;
pub mod info;
pub mod validate;
