//! Core data models used throughout the recommender.
//!
//! These types represent the values that flow through the pipeline:
//!
//! ```text
//! token JSON → TokenMap → Fingerprint → file_token + relation_distance
//!                                              ↓
//!                       global terms JSON → TermStat → tf_idf
//!                                              ↓
//!                  buffer JSON → PromptMatch   ↓
//!                                      MatrixEdge → item_matrix_triangle
//!                                              ↓
//!                                           Route → route_list.txt
//! ```
//!
//! # Type Relationships
//!
//! - A **[`WeightedToken`]** is one surviving token of a document after the
//!   ingestion filter, carrying its raw frequency and its unit-vector weight.
//! - A **[`Fingerprint`]** is the full per-document record: the aggregate
//!   `file_token` row plus the `relation_distance` rows.
//! - A **[`ResourceRecord`]** identifies one source file by its stable
//!   content hash.
//! - A **[`TermStat`]** is one corpus-wide TF-IDF row.
//! - A **[`MatrixEdge`]** is one upper-triangle similarity edge.
//! - A **[`PromptMatch`]** is one ranked candidate for a query.
//! - A **[`Route`]** is the result of one greedy walk over the edge store.

/// One filtered token of a document.
///
/// `weight` is the token-level relational distance: frequency divided by the
/// document's Euclidean norm, strictly in (0, 1] for a non-empty document.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedToken {
    pub token: String,
    pub frequency: i64,
    pub weight: f64,
}

/// Per-document fingerprint: the `file_token` row and its token rows.
///
/// `relational_distance` is the Euclidean norm of the *raw* (pre-filter)
/// frequency vector; `total_tokens` sums the raw counts; `unique_tokens`
/// counts the keys that survived the filter.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub file_name: String,
    pub total_tokens: i64,
    pub unique_tokens: i64,
    pub relational_distance: f64,
    pub tokens: Vec<WeightedToken>,
}

/// One `file_info` row: a source file identified by a stable content hash
/// over its path, modification time, and external chunk count.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub epoch_time: i64,
    pub chunk_count: i64,
}

/// One `tf_idf` row.
#[derive(Debug, Clone)]
pub struct TermStat {
    pub word: String,
    pub freq: i64,
    pub doc_count: i64,
    pub tf_idf: f64,
}

/// One upper-triangle similarity edge, `source` preceding `target` in
/// processing order. `distance` is strictly positive; non-positive scores
/// are dropped before an edge is ever built.
#[derive(Debug, Clone)]
pub struct MatrixEdge {
    pub target_id: String,
    pub target_name: String,
    pub source_id: String,
    pub source_name: String,
    pub distance: f64,
}

/// One ranked candidate document for a prompt query.
#[derive(Debug, Clone)]
pub struct PromptMatch {
    pub id: String,
    pub file_name: String,
    pub score: f64,
}

/// One advance of a route walk.
#[derive(Debug, Clone)]
pub struct RouteStep {
    pub key: String,
    pub title: String,
    pub distance: f64,
}

/// Why a route walk stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEnding {
    /// The current node has no outgoing edges.
    NoFurtherRoute,
    /// Several targets tied at the maximum distance; all are reported.
    Diverged,
    /// The single best target was already visited or is not a known title.
    LoopOrUnreachable,
}

/// The result of one greedy walk from a start document.
#[derive(Debug, Clone)]
pub struct Route {
    pub start_key: String,
    pub start_title: String,
    pub steps: Vec<RouteStep>,
    /// Populated only on divergence: the tied targets, in key order.
    pub diverged: Vec<RouteStep>,
    pub ending: RouteEnding,
}
