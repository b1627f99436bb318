//! Typed message contract between the recording core and control surfaces
//!
//! Commands and events are fire-and-forget named messages in both directions;
//! there is no request/response pairing and no ordering guarantee beyond what
//! the underlying channel provides.

pub mod messages;

pub use messages::{ControlCommand, ControlEvent};
