pub mod controller;
pub mod diagnostics;
pub mod events;
pub mod verify;

pub use controller::*;
pub use diagnostics::*;
pub use events::*;
pub use verify::*;
