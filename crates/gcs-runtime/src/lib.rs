//! `gcs-runtime` – the station's owning loop and operator entry points.
//!
//! # Modules
//!
//! - [`dispatcher`] – [`Dispatcher`]: heartbeat, rate-gated teleop and
//!   periodic revalidation, checked against a monotonic clock every tick.
//! - [`station`] – [`Station`]: the single task that owns
//!   [`SharedState`][gcs_kernel::SharedState], draining posted jobs and
//!   ticking the dispatcher.  [`StationHandle`] stops it cooperatively.
//! - [`commands`] – [`OperatorCommands`]: commanded mode, e-stop, snapshot
//!   and snapshot streams for operator-facing surfaces.
//! - [`telemetry`] – [`init_tracing`]: `tracing-subscriber` setup with
//!   optional OTLP span export.

pub mod commands;
pub mod dispatcher;
pub mod station;
pub mod telemetry;

pub use commands::OperatorCommands;
pub use dispatcher::{DispatchConfig, Dispatcher, TickReport};
pub use station::{Station, StationHandle};
pub use telemetry::{TracerProviderGuard, init_tracing};
