use crate::u4;

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

pub const MEMORY_SIZE: usize = 4096;
/// Instruction-visible addresses use only the low 12 bits.
pub const ADDRESS_MASK: u16 = 0x0FFF;
pub const ROM_START_ADDRESS: usize = 0x200;
pub const STACK_DEPTH: usize = 16;
pub const KEY_COUNT: usize = 16;

/// Result of a single CPU cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// The display buffer changed; the host should render before continuing.
    Redraw,
    /// The machine is blocked on FX0A until a key is pressed.
    WaitingForKey,
}

/// Execution mode of the cycle driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Running,
    /// FX0A is pending; the result goes to `Vx` once a key is observed pressed.
    WaitingForKey { x: u4 },
}

/// Edge event emitted when the sound timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundTrigger;

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("Stack overflow: call at {address:#05X} with 16 frames already on the stack")]
    StackOverflow { address: u16 },

    #[error("Stack underflow: return at {address:#05X} with empty call stack")]
    StackUnderflow { address: u16 },

    #[error("Unsupported opcode {opcode:#06X} at {address:#05X}")]
    UnsupportedOpcode { opcode: u16, address: u16 },

    #[error("Invalid {clock} clock rate {hz} Hz, must be finite and above zero")]
    InvalidClockRate { clock: &'static str, hz: f32 },
}
