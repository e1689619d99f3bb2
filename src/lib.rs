pub mod alerts;
pub mod api;
pub mod app;
pub mod conditions;
pub mod config;
pub mod coordinator;
pub mod derived;
pub mod feeds;
pub mod fetch_error;
pub mod merge;
pub mod models;
pub mod scheduler;
