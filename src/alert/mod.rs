//! Reading assessment: severity bands and staleness.
//!
//! Submodules:
//! - `severity`: index → EPA-style band (color and label).
//! - `stalenesses`: flags readings whose upstream timestamp is too old.

pub mod severity;
pub mod stalenesses;
