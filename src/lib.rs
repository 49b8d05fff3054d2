pub mod admin_token;
pub mod config;
pub mod domain;
pub mod http;
pub mod service;
pub mod state;
pub mod version;
