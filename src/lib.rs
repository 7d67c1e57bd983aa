pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod pagination;
pub mod query;
pub mod rate_limiter;
pub mod repository;
pub mod rpc;
pub mod scanner;
pub mod sink;
