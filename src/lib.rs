pub mod config;
pub mod documents;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod rag;
pub mod redis;
pub mod repository;
pub mod repository_traits;
pub mod speech;
pub mod transport;
