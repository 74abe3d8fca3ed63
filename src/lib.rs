//! # lexstore
//!
//! A compact, read-only, queryable store for large tag-structured text
//! documents (dictionary entries): an offline writer compiles a source
//! document collection into a single binary file; a reader opens that file
//! and serves keyword lookup and full entry reconstruction without ever
//! loading the whole document into memory.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Writer (offline)                         │
//! │  pass 1: Collect ──► alphabet · lexicon · entry ids          │
//! │  pass 2: Encode  ──► bp bits + records ──► Cluster Packer    │
//! │                        │                      │ (LZ4 blocks) │
//! │                        ▼                      ▼              │
//! │              id / paths mappings        store file           │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Reader (online)                          │
//! │  open ──► header + footer tables in memory                   │
//! │  find ──► lexicon prefix iteration over the id mapping       │
//! │  get  ──► cluster fetch ──► decompress ──► bit replay        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;

pub mod format;
pub mod lexicon;
pub mod reader;
pub mod scan;
pub mod writer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LexError, Result};
pub use reader::Reader;
pub use writer::{write, WriteSummary};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of lexstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
