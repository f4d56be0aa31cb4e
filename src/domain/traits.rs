// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, not
// against concrete loaders or sinks:
//   - JsonlLoader implements RecordSource
//   - a future CSV or database reader would too
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::example::RawRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can produce raw article rows.
pub trait RecordSource {
    /// Load every available row, in source order.
    fn load_all(&self) -> Result<Vec<RawRecord>>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved to and restored from a JSON file.
///
/// Implementations:
///   - EncodingSnapshot → feature schema + per-column category codes
pub trait Persistable: Sized {
    fn save(&self, path: &std::path::Path) -> Result<()>;
    fn load(path: &std::path::Path) -> Result<Self>;
}
