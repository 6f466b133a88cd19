//! Celebrity-news ingestion pipeline: fetch candidates per tracked
//! subject, score them for visual quality, dedupe and mix the
//! survivors, and persist the finished feed.

pub mod coordinator;
pub mod credentials;
pub mod fetch;
pub mod lexicon;
pub mod mixer;
pub mod scoring;
pub mod stats;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use coordinator::RunCoordinator;
pub use credentials::CredentialPool;
pub use fetch::{FetchOrchestrator, SearchApi};
pub use scoring::ContentScorer;
