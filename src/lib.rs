//! CHIP-8 virtual machine.
//!
//! The [`emu`] module holds the machine itself: state, decoder, executor and timers.
//! Program loading, rendering and input are left to the host; see `src/bin/chip8.rs`
//! for a terminal front end.

pub mod emu;
mod nibble;

pub use nibble::u4;
