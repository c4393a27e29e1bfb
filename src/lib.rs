//! # blobdex
//!
//! A CLI that feeds a managed vector search index from a cloud blob
//! container and relays interactive chat to a hosted orchestrator agent.
//!
//! Two independent pipelines, no shared runtime state:
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │ Blob      │──▶│  Pipeline                 │──▶│ Search index │
//! │ container │   │ extract → chunk → embed  │   │ (managed)    │
//! └───────────┘   └──────────────────────────┘   └──────────────┘
//!
//! ┌───────┐   ┌───────────────────────┐   ┌──────────────┐
//! │ stdin │──▶│ post → run → poll →   │──▶│ stdout       │
//! │       │   │ fetch reply           │   │              │
//! └───────┘   └───────────────────────┘   └──────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! blobdex init       # provision the search index
//! blobdex ingest     # index every PDF in the container
//! blobdex chat       # talk to the orchestrator agent
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-driven settings |
//! | [`models`] | Transient data types |
//! | [`chunk`] | Overlapping fixed-window text chunker |
//! | [`blob`] | Blob container listing and download |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | Embeddings API client |
//! | [`search`] | Search-index provisioning and upserts |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`agent`] | Orchestrator-agent REST client |
//! | [`chat`] | Interactive relay loop |

pub mod agent;
pub mod blob;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod search;
