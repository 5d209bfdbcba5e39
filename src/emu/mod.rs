mod chip8;
mod execute;
mod font;
mod opcode;
mod runner;
mod timers;
mod types;

pub use chip8::*;
pub use execute::PcUpdate;
pub use font::*;
pub use opcode::*;
pub use runner::*;
pub use types::*;
