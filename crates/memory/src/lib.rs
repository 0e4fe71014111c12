//! Two-tier memory subsystem (spec §4.11): short-term conversation window,
//! long-term user profile, and a coordinator that unifies both fetches
//! under a token budget. Generalizes the teacher's three-tier
//! (core/episodic/semantic) `agent::memory` down to the two tiers this
//! spec names.

pub mod coordinator;
pub mod error;
pub mod fakes;
pub mod long_term;
pub mod short_term;

pub use coordinator::{CombinedMemoryContext, MemoryCoordinator};
pub use error::MemoryError;
pub use long_term::{LongTermMemory, LongTermProfile};
pub use short_term::{Message, Role, ShortTermMemory};
