#![deny(missing_docs)]

//! Core library for the contract analysis service.

/// Generative-text client and sampling policy.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF and OCR text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Request outcome counters.
pub mod metrics;
/// Hosted checkout sessions.
pub mod payments;
/// Analysis and classification pipelines.
pub mod pipeline;
/// Instruction pairs for the model.
pub mod prompts;
/// Recovery of structured payloads from model output.
pub mod reconcile;
