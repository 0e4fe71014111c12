//! Intent classification and query rewriting (spec §4.2-4.3). Generalizes
//! the teacher's `text_processing::intent` and `rag::agentic` query-context
//! handling into a legal-domain classifier and rewriter, with the heuristic
//! pass grounded on `agent::intent::IntentDetector`'s precompiled-regex
//! style and the rewriter grounded on `other_examples`' `query_rewriter.rs`.

pub mod error;
pub mod intent_classifier;
pub mod query_rewriter;

pub use error::NlpError;
pub use intent_classifier::{adaptive_params, ClassificationResult, IntentClassifier};
pub use query_rewriter::{QueryRewriter, RewrittenQuery};
