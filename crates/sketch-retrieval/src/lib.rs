//! # sketch-retrieval
//!
//! Shot-to-asset retrieval for sketch-search.
//!
//! A [`RetrievalSession`] holds the embedder and index for one run. A
//! [`Retriever`] built from it ranks catalog assets for each shot description
//! and runs whole batches with bounded concurrency, reporting per-shot
//! failures instead of aborting.
//!
//! ```rust,ignore
//! let session = RetrievalSession::open(&settings).await?;
//! let retriever = session.retriever(RetrieverConfig::from_settings(&settings.retrieval, None));
//! let batch = retriever.search_multiple_shots(&queries.texts(), 3).await;
//! let summary = BatchSummary::from_results(&batch);
//! session.close();
//! ```

pub mod batch;
pub mod error;
pub mod retriever;
pub mod session;
pub mod types;

pub use batch::BatchSummary;
pub use error::RetrievalError;
pub use retriever::{round_score, Retriever, RetrieverConfig};
pub use session::{RetrievalSession, SessionMode};
pub use types::{match_lists, MatchResult, ShotMatches};
