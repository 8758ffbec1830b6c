pub mod api;
pub mod azure_openai;
pub mod config;
pub mod docx;
pub mod fields;
pub mod filler;
pub mod questions;
pub mod service;
pub mod sharepoint;
pub mod store;
