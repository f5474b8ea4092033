pub mod backend;
pub mod config;
pub mod conversation;
pub mod http;
pub mod registration;
pub mod session;
pub mod types;
pub mod validation;
