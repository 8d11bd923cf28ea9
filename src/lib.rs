#[macro_use]
extern crate failure;

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod matcher;
pub mod report;
pub mod types;
pub mod writer;
