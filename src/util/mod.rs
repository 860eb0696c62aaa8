pub mod blocking;
pub mod clock;
pub mod telemetry;

pub use blocking::blocking;
pub use clock::*;
pub use telemetry::*;
