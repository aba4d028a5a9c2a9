// Library interface for the InMusic ingestion pipeline
// The binary and the integration tests import modules from here

pub mod classify;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod ingestion;
pub mod models;
pub mod report;
pub mod sources;
pub mod storage;
pub mod text;
