pub mod analysis;
pub mod app;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod gemini;
pub mod prompts;
pub mod recommend;
pub mod report;
pub mod store;
