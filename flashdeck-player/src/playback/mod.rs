//! Playback core: repeat controller, navigator, sequencer and the engine driving it

pub mod effects;
pub mod engine;
pub mod navigator;
pub mod repeat;
pub mod sequencer;
pub mod session;
pub mod transport;

pub use effects::{Effect, PendingUnit, UnitToken};
pub use engine::{Engine, EngineConfig, EngineHandle};
pub use navigator::Navigator;
pub use repeat::{RepeatController, RepeatDecision};
pub use sequencer::Sequencer;
pub use session::SessionSnapshot;
pub use transport::TransportCommand;
