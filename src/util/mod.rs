pub mod clock;
pub mod merge;
pub mod serde;
pub mod telemetry;

pub use clock::*;
pub use merge::*;
pub use serde::*;
pub use telemetry::*;
