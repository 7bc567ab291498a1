//! Core data types: exchange identifiers and the canonical trade record.

pub mod enums;
pub mod trade;

pub use enums::*;
pub use trade::*;
