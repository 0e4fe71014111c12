//! State-machine orchestrator driving the legal question-answering pipeline
//! (spec §4-§7). Wires every collaborator crate (`zimlex-cache`,
//! `zimlex-memory`, `zimlex-retrieval`, `zimlex-llm`, `zimlex-nlp`,
//! `zimlex-quality`) into one node graph and exposes it as a single
//! streaming entry point.

pub mod decision;
pub mod deps;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod request;

pub use decision::{decide, Decision};
pub use deps::Dependencies;
pub use error::OrchestratorError;
pub use events::{FinalPayload, MetaPayload, StreamEvent, SynthesisPayload, TimingsPayload};
pub use orchestrator::Orchestrator;
pub use request::QueryRequest;
