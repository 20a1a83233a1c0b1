use chrono::{DateTime, Utc};

/// Something that happened to an aggregate.
///
/// Aggregates emit these from `handle` and evolve from them in `apply`. The
/// name is dotted `<crate>.<aggregate>.<fact>` and never changes once
/// released; a payload change bumps `version` instead.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// e.g. `operations.document.status_changed`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version, starting at 1.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
