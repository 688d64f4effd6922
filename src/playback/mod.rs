//! Crossfading playback: slots, sources, engine, and the state machine

pub mod controller;
pub mod engine;
pub mod slot;
pub mod source;

pub use controller::{ControlState, PlayerController, PlayerStatus};
pub use engine::{CrossfadeEngine, EngineConfig, LoadOptions};
pub use slot::{SlotId, SlotStatus};
pub use source::{AudioSource, PlayOutcome, RodioSource};
