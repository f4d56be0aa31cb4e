// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// system works with: encoded articles, the feature schema and
// the metric strategies used to judge predictions.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything here can be unit tested without a GPU.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// One encoded (user, post) interaction instance
pub mod example;

/// Column configuration and the modality layout derived from it
pub mod schema;

/// Classification and regression metric strategies
pub mod metric;

/// Core abstractions (traits) that other layers implement
pub mod traits;
