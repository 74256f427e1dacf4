//! Composition root: owns the CPU and ticks VGA, audio, and the loader
//! against it in lock-step each cycle.

mod config;
mod error;
mod machine;

pub use config::GigatronConfig;
pub use error::GigatronError;
pub use machine::Gigatron;
