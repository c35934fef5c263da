pub mod agents;
pub mod config;
pub mod engine;
pub mod health;
pub mod llm;
pub mod logging;
pub mod tournament;

pub use engine::types::{Chips, SeatId};
