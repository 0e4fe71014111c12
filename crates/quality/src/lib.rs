//! Quality gate, self-critique, refined synthesis, and iterative retrieval
//! for the self-correction loop (spec §4.8-4.9). Attribution is grounded on
//! a hand-rolled sentence/paragraph splitter over `unicode-segmentation`;
//! the self-correction loop's iterative retriever is grounded on the
//! teacher's `rag::agentic::AgenticRetriever`.

pub mod attribution;
pub mod error;
pub mod gate;
pub mod iterative_retrieval;
pub mod refined_synthesis;
pub mod self_critic;

pub use attribution::{check_attribution, AttributionResult};
pub use error::QualityError;
pub use gate::{QualityGate, QualityGateResult};
pub use iterative_retrieval::{build_gap_fill_request, IterativeRetriever};
pub use refined_synthesis::RefinedSynthesizer;
pub use self_critic::{SelfCritic, SelfCriticOutput};
