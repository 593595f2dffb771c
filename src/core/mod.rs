pub mod audit;
pub mod cache;
pub mod config;
pub mod counters;
pub mod error;
pub mod shared;
pub mod store;
