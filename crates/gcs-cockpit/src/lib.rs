//! `gcs-cockpit` – WebSocket state stream and operator command ingress.
//!
//! A thin HTTP + WebSocket surface over
//! [`OperatorCommands`][gcs_runtime::OperatorCommands]:
//!
//! | Request | Effect |
//! |---|---|
//! | `GET /api/state` | One JSON snapshot. |
//! | WebSocket `/ws` | Immediate snapshot, then every broadcast, with a keepalive snapshot after an idle window. |
//! | upstream `{"op":"cmd_mode","mode":n}` | Commanded mode change, rejected outside `-1..=2`. |
//! | upstream `{"op":"estop","active":b}` | Local e-stop set or cleared. |
//!
//! Each upstream message is answered with `{"ok":true,...}` or
//! `{"ok":false,"error":...}` on the same socket.

pub mod config;
pub mod server;

pub use config::CockpitConfig;
pub use server::{CockpitServer, DEFAULT_PORT};
