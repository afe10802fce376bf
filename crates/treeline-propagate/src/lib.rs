//! Dependency propagation for Treeline.
//!
//! When a tree node advances (new version saved, new release cut), every
//! reference tracking it is re-resolved and updated. Owners whose references
//! changed may advance in turn; the [`PropagationDriver`] follows them with a
//! per-pass visited set so diamonds are handled once and cycles terminate.
//!
//! - [`PropagationDriver`]: synchronous, level-by-level propagation pass
//! - [`ReferenceGraph`]: the storage view the driver works against
//! - [`PropagationQueue`]: tokio worker consuming [`AdvancementEvent`]s in order
//! - [`PropagationReport`]: batch outcome with per-reference failures

pub mod driver;
pub mod error;
pub mod graph;
pub mod queue;
pub mod report;

pub use driver::{PropagationDriver, DEFAULT_MAX_DEPTH};
pub use error::{PropagateError, PropagateResult};
pub use graph::{ReferenceGraph, StoreGraph};
pub use queue::{AdvancementEvent, PropagationQueue, DEFAULT_QUEUE_CAPACITY};
pub use report::{AppliedUpdate, PropagationFailure, PropagationReport};
