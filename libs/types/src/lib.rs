//! Types library for the order-flow footprint engine
//!
//! Core value types shared by the footprint pipeline and its collaborators,
//! keeping price and volume arithmetic deterministic (`rust_decimal`) and
//! aggressor sides strongly typed.
//!
//! # Modules
//! - `ids`: Identifiers (InstrumentId, SessionId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `trade`: Aggressor side and classified trades
//! - `time`: Epoch-millisecond helpers
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod trade;
pub mod time;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::trade::*;
    pub use crate::time::*;
    pub use crate::errors::*;
}
