pub mod analytics;
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod cursor;
pub mod error;
pub mod models;
pub mod pagination;
pub mod redirect;
pub mod service;
pub mod slug;
pub mod storage;

pub use app::Sink;
pub use error::{LinkError, LinkResult};
