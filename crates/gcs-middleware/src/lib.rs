//! `gcs-middleware` – everything between the wire and the state store.
//!
//! - [`codec`] – [`WireCodec`] with the fixed binary and structured JSON
//!   encodings.
//! - [`transport`] – UDP and MQTT byte carriers behind [`Transport`].
//! - [`inbound`] – [`InboundRouter`], which turns decoded frames into posted
//!   store jobs.
//! - [`link`] – [`VehicleLink`], the outbound [`CommandLink`] primitives.
//! - [`config`] – `[link]` settings and [`open_link`].

pub mod codec;
pub mod config;
pub mod inbound;
pub mod link;
pub mod transport;

pub use codec::{
    BinaryCodec, Encoded, FieldKind, FieldSpec, Frame, OutboundCommand, SequenceCounter,
    StructuredCodec, Tag, WireCodec, fixed_text,
};
pub use config::{LinkConfig, TransportKind, open_link};
pub use inbound::InboundRouter;
pub use link::{CommandLink, VehicleLink};
pub use transport::{ReceiveCallback, Transport, join_with_timeout};
