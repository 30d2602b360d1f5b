//! Field extraction heuristics for shipping labels and device stickers.
//!
//! Every extractor is a pure function of its input text (plus the
//! deployment's `ExtractionProfile` for the shipping fields) and never fails:
//! a field that cannot be found is `None`.

pub mod rules;
pub mod profile;
pub mod device;
pub mod shipping;
pub mod assemble;

pub use assemble::*;
pub use device::*;
pub use profile::*;
pub use shipping::*;
