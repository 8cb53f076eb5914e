//! `gcs-kernel` – the shared state store and everything that touches it.
//!
//! | Module | Role |
//! |---|---|
//! | [`state`] | [`SharedState`]: sub-structs, indexed collections, snapshot |
//! | [`validation`] | [`Validator`] and the built-in safety [`Rule`]s |
//! | [`fanout`] | Bounded snapshot sinks and the [`SnapshotStream`] consumer |
//! | [`post`] | [`StoreHandle`] / [`StoreInbox`]: cross-context job queue |
//! | [`collection`] | [`IndexedCollection`], the grow-only positional list |
//!
//! The store is single-writer.  Whoever holds the [`StoreInbox`] owns the
//! state; everyone else posts closures through a [`StoreHandle`].

pub mod collection;
pub mod fanout;
pub mod post;
pub mod state;
pub mod validation;

pub use collection::IndexedCollection;
pub use fanout::{DeliveryReport, FanOut, SinkId, SinkReceiver, SnapshotStream, sink_channel};
pub use post::{Job, LocalStore, StoreHandle, StoreInbox, job_queue};
pub use state::{Collection, NEVER_RECEIVED, SharedState, SubStruct};
pub use validation::{Rule, ValidationConfig, Validator, VehicleView};
