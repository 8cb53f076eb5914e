//! Inbound dispatch – decoded frames to store jobs.
//!
//! Runs on the transport's receive context.  Each frame becomes exactly one
//! posted job, so the owning task applies a frame's effects together and
//! nothing here mutates state directly.
//!
//! | Pattern | Tags |
//! |---|---|
//! | direct merge | `MS` `TV` `NS` `HS` `EP` `CR` |
//! | side channel | `RE`, and `MS` (a missing `remote_enabled` reads as off) |
//! | unit conversion | `MR` (bytes → MB) |
//! | indexed upsert | `GR` `DP` `NF`, plus `NM` interface entries; an empty list still counts as a receipt |
//! | liveness only | `DI` |

use gcs_kernel::{Collection, StoreHandle, SubStruct};
use gcs_types::{FieldMap, FieldValue};
use tracing::{debug, trace};

use crate::codec::{Frame, Tag};

const BYTES_PER_MB: u64 = 1_048_576;
/// Entry indices are one byte on the binary wire; larger ones are dropped.
const MAX_ENTRY_INDEX: usize = u8::MAX as usize;

#[derive(Clone)]
pub struct InboundRouter {
    store: StoreHandle,
}

impl InboundRouter {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Post the effects of `frame` to the store.  Returns `false` when the
    /// frame was ignored or the store is gone.
    pub fn dispatch(&self, frame: Frame) -> bool {
        trace!(tag = %frame.tag, seq = ?frame.seq, "inbound frame");
        let Frame {
            tag,
            fields,
            entries,
            ..
        } = frame;

        match tag {
            Tag::MuxStatus => {
                let remote = fields
                    .get("remote_enabled")
                    .and_then(FieldValue::as_bool)
                    .unwrap_or(false);
                self.store.post(move |s| {
                    s.apply_update(SubStruct::Mux, &fields);
                    s.set_remote_enabled(remote);
                })
            }
            Tag::TwistValues => self.store.apply_update(SubStruct::Twist, fields),
            Tag::NetworkStatus => self.store.apply_update(SubStruct::Network, fields),
            Tag::HunterStatus => self.store.apply_update(SubStruct::Hunter, fields),
            Tag::EstopStatus => self.store.apply_update(SubStruct::Estop, fields),
            Tag::CpuResources => self.store.apply_update(SubStruct::Resources, fields),
            Tag::RemoteEnabled => {
                let Some(enabled) = fields.get("remote_enabled").and_then(FieldValue::as_bool)
                else {
                    return false;
                };
                self.store.post(move |s| {
                    s.touch();
                    s.set_remote_enabled(enabled);
                })
            }
            Tag::MemResources => self
                .store
                .apply_update(SubStruct::Resources, bytes_to_megabytes(&fields)),
            Tag::DiskIo => self.store.touch(),
            Tag::GpuResources => self.upsert_all(Collection::Gpu, None, indexed(fields, entries)),
            Tag::DiskPartition => self.upsert_all(Collection::Disk, None, indexed(fields, entries)),
            Tag::NetInterface => {
                self.upsert_all(Collection::NetInterface, None, indexed(fields, entries))
            }
            Tag::NetMetrics => self.upsert_all(Collection::NetInterface, Some(fields), entries),
            Tag::Heartbeat | Tag::Teleop | Tag::Estop | Tag::CmdMode => {
                debug!(%tag, "ignoring outbound tag on inbound path");
                false
            }
        }
    }

    /// Post one job applying an optional resources merge followed by every
    /// indexed entry.  Entries without a usable `idx` are skipped; when
    /// nothing is left the job still refreshes `last_received`.
    fn upsert_all(&self, collection: Collection, resources: Option<FieldMap>, entries: Vec<FieldMap>) -> bool {
        let slots: Vec<(usize, FieldMap)> = entries
            .into_iter()
            .filter_map(|entry| {
                let idx = entry
                    .get("idx")
                    .and_then(FieldValue::as_u64)
                    .and_then(|i| usize::try_from(i).ok())
                    .filter(|i| *i <= MAX_ENTRY_INDEX);
                if idx.is_none() {
                    debug!(?collection, "indexed entry without usable idx dropped");
                }
                idx.map(|i| (i, entry))
            })
            .collect();

        self.store.post(move |s| {
            if resources.is_none() && slots.is_empty() {
                s.touch();
                s.validate();
                s.broadcast();
                return;
            }
            if let Some(fields) = &resources {
                s.apply_update(SubStruct::Resources, fields);
            }
            for (idx, entry) in &slots {
                s.apply_indexed_update(collection, *idx, entry);
            }
        })
    }
}

/// Binary indexed frames carry their single entry in the top-level fields;
/// structured ones carry an entry list.
fn indexed(fields: FieldMap, entries: Vec<FieldMap>) -> Vec<FieldMap> {
    if entries.is_empty() && fields.contains_key("idx") {
        vec![fields]
    } else {
        entries
    }
}

fn bytes_to_megabytes(fields: &FieldMap) -> FieldMap {
    [("ram_total_bytes", "ram_total"), ("ram_used_bytes", "ram_used")]
        .into_iter()
        .filter_map(|(from, to)| {
            let bytes = fields.get(from)?.as_u64()?;
            let mb = i64::try_from(bytes / BYTES_PER_MB).ok()?;
            Some((to.to_string(), FieldValue::Int(mb)))
        })
        .collect()
}
