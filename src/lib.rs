pub mod app;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod models;
pub mod notice;
pub mod prefs;
pub mod rating;
pub mod router;
pub mod upload;
pub mod utils;

pub use error::{Error, Result};
