pub mod orchestrator;
pub mod spotify;
pub mod sync;
pub mod youtube;
