//! Effect state store
//!
//! Remembers what a handler overrode so the effect can be undone exactly once:
//! - **Override records**: the pre-override value of a scalar attribute
//!   (walk/fly speed), captured on the first override only
//! - **Suppressed effects**: status effects removed by a zone, stored with an
//!   absolute expiry so they resume with the time they had left
//!
//! ```text
//!   live effect (200 ticks left)          zone forbids it
//!   ───────────────────────────▶ suppress ──────────────▶ expires_at = now + 10s
//!
//!   zone no longer forbids it (60 ticks later)
//!   ───────────────────────────▶ restore  ──────────────▶ re-applied with 140 ticks
//! ```

mod store;

pub use store::{EffectStateStore, OverrideKind, OverrideRecord, SuppressedStatusEffect};
