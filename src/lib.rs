pub mod api;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod report;
pub mod storage;
