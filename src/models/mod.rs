//! Domain models shared between the repository, the engine, and the API.

mod attendance;
mod employee;
mod geofence;
mod lead;
mod notification;
mod role;

pub use attendance::*;
pub use employee::*;
pub use geofence::*;
pub use lead::*;
pub use notification::*;
pub use role::*;
