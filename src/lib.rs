//! inkpress: ingestion pipeline for a Markdown blog.
//!
//! Layers follow the usual split: `domain` holds pure invariants,
//! `application` orchestrates them behind repository and storage traits,
//! and `infra` supplies the Postgres, HTTP and telemetry adapters.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
