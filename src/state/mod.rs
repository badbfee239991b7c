//! State management and events

mod container;
mod events;

pub use container::{ControllerState, ControllerStatus, StateContainer};
pub use events::{ControllerEvent, EventBus, EventFilter};
