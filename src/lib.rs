//! # studyrec
//!
//! **An offline content-based document recommender and learning-route
//! engine.**
//!
//! studyrec fingerprints a local collection of PDF-derived token JSONs into
//! SQLite, builds corpus-wide TF-IDF statistics, precomputes an item-item
//! similarity matrix in parallel, and serves prompt-based retrieval plus
//! greedy "learning routes" through related documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ token JSONs │──▶│ fingerprints │──▶│     SQLite      │
//! │ + resources │   │  + TF-IDF    │   │ triangle + rows │
//! └─────────────┘   └──────────────┘   └───────┬─────────┘
//!                                              │
//!                            ┌─────────────────┤
//!                            ▼                 ▼
//!                      ┌──────────┐      ┌──────────┐
//!                      │  prompt  │      │  routes  │
//!                      │ (top-N)  │      │ (greedy) │
//!                      └──────────┘      └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **token transform** ([`tokens`]) parses each token→count JSON and
//!    derives the document norm and the filtered weighted tokens.
//! 2. The **fingerprint writer** ([`fingerprint`]) persists one `file_token`
//!    row and N `relation_distance` rows per document in one transaction.
//! 3. The **resource recorder** ([`resources`]) assigns each source file a
//!    stable MD5 content id and records it in `file_info`.
//! 4. The **TF-IDF builder** ([`tfidf`]) combines the tokenizer's global
//!    term counts with per-term document counts into `tf_idf`.
//! 5. The **prompt scorer** ([`prompt`]) ranks every candidate against a
//!    query buffer and writes the top-N report.
//! 6. The **similarity builder** ([`matrix`]) computes the upper-triangle
//!    item matrix with parallel producers and a single writer.
//! 7. The **route generator** ([`routes`]) walks the triangle greedily with
//!    cycle and divergence detection.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration: paths and tunables, with defaults |
//! | [`models`] | Core data types flowing through the pipeline |
//! | [`tokens`] | Token transform: parse, sum, norm, filter |
//! | [`scan`] | Deterministic input-directory listing |
//! | [`dump`] | Diagnostic CSV dumps (never fatal) |
//! | [`fingerprint`] | Document fingerprint persistence |
//! | [`resources`] | Stable resource identities |
//! | [`tfidf`] | Corpus term statistics |
//! | [`prompt`] | Query scoring and the ranked report |
//! | [`matrix`] | Parallel similarity triangle build |
//! | [`routes`] | Greedy route generation |
//! | [`stats`] | Database overview for `--showComponents` |
//! | [`progress`] | Stderr progress reporting |
//! | [`db`] | SQLite connections (pool + dedicated, WAL) |
//! | [`migrate`] | Idempotent schema creation |

pub mod config;
pub mod db;
pub mod dump;
pub mod fingerprint;
pub mod matrix;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod resources;
pub mod routes;
pub mod scan;
pub mod stats;
pub mod tfidf;
pub mod tokens;
