use rand::{SeedableRng, rngs::StdRng};

use super::{
    ADDRESS_MASK, Chip8Error, Chip8Result, DISPLAY_X, DISPLAY_Y, Display, FONT, FONT_END_ADDRESS,
    FONT_START_ADDRESS, KEY_COUNT, MEMORY_SIZE, Opcode, PcUpdate, ROM_START_ADDRESS, RunMode,
    STACK_DEPTH, SoundTrigger,
};
use crate::u4;

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 cells, each 0 or 1
    pub(crate) display: Display<u8>,
    /// Set whenever the display buffer changes, cleared by [`Chip8::take_redraw`]
    pub(crate) redraw: bool,

    /// Program counter: address of the instruction to execute next
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Return addresses, valid below `sp`
    pub(crate) stack: [u16; STACK_DEPTH],
    pub(crate) sp: u8,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, triggers a sound when it expires
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; KEY_COUNT],
    pub(crate) mode: RunMode,

    pub(crate) rng: StdRng,
}

impl Chip8 {
    /// Creates a powered-on machine with a random source seeded from the OS.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a powered-on machine whose random instruction is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            display: [[0; DISPLAY_X]; DISPLAY_Y],
            redraw: false,
            pc: 0,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_DEPTH],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; KEY_COUNT],
            mode: RunMode::Running,
            rng,
        };
        chip8.reset();
        chip8
    }

    /// Returns the machine to its power-on state.
    ///
    /// Memory, registers, stack, timers, keypad and display are zeroed, the font set is
    /// installed at the bottom of memory, PC points at the program start and a redraw is
    /// requested so the host draws a blank frame first.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);

        self.display = [[0; DISPLAY_X]; DISPLAY_Y];
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack = [0; STACK_DEPTH];
        self.sp = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad = [false; KEY_COUNT];
        self.mode = RunMode::Running;
        self.redraw = true;

        log::debug!("machine reset, pc = {:#05X}", self.pc);
    }

    /// Copies a program image into memory at the program start address.
    ///
    /// Returns the number of bytes loaded. Nothing is written if the image does not fit.
    pub fn load(&mut self, rom: &[u8]) -> Result<usize, Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        log::debug!("loaded {} bytes at {:#05X}", rom.len(), ROM_START_ADDRESS);
        Ok(rom.len())
    }

    /// Runs one full machine cycle: one instruction, then one timer update.
    ///
    /// Timers are updated even when the instruction fails.
    pub fn cycle(&mut self) -> (Result<Chip8Result, Chip8Error>, Option<SoundTrigger>) {
        let result = self.cpu_cycle();
        let sound = self.timers_cycle();
        (result, sound)
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// While an FX0A is pending this only re-checks the keypad.
    pub fn cpu_cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        if let RunMode::WaitingForKey { x } = self.mode {
            return Ok(self.resume_wait_for_key(x));
        }

        let opcode = self.fetch();
        let decoded_opcode = Opcode::decode(opcode);
        log::trace!("{:#05X}: {opcode:04X} {decoded_opcode}", self.pc);

        let update = self.execute(decoded_opcode).inspect_err(|e| {
            if matches!(e, Chip8Error::UnsupportedOpcode { .. }) {
                log::warn!("{e}");
            }
        })?;

        self.apply_pc_update(update);

        Ok(match (update, decoded_opcode) {
            (PcUpdate::Wait, _) => Chip8Result::WaitingForKey,
            (_, Opcode::ClearDisplay | Opcode::Draw { .. }) => Chip8Result::Redraw,
            _ => Chip8Result::Continue,
        })
    }

    /// Sets the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Replaces the whole keypad state.
    pub fn set_keypad(&mut self, keypad: [bool; KEY_COUNT]) {
        self.keypad = keypad;
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x] != 0
    }

    pub fn display(&self) -> &Display<u8> {
        &self.display
    }

    /// Returns whether the display changed since the last call and clears the flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.v
    }

    /// The active part of the call stack, oldest frame first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..usize::from(self.sp)]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn keypad(&self) -> &[bool; KEY_COUNT] {
        &self.keypad
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Fetches the 16-bit instruction word at PC.
    fn fetch(&self) -> u16 {
        Opcode::word(self.mem(self.pc), self.mem(self.pc.wrapping_add(1)))
    }

    fn apply_pc_update(&mut self, update: PcUpdate) {
        match update {
            PcUpdate::Next => self.pc = self.pc.wrapping_add(2),
            PcUpdate::Skip => self.pc = self.pc.wrapping_add(4),
            PcUpdate::Jump(addr) => self.pc = addr,
            PcUpdate::Wait => {}
        }
    }

    fn resume_wait_for_key(&mut self, x: u4) -> Chip8Result {
        // Lowest-indexed key wins when several are held
        let Some(key) = self.keypad.iter().position(|&pressed| pressed) else {
            return Chip8Result::WaitingForKey;
        };

        log::debug!("key {key:X} pressed, resuming at {:#05X}", self.pc);
        self.v[x] = key as u8;
        self.mode = RunMode::Running;
        self.pc = self.pc.wrapping_add(2);
        Chip8Result::Continue
    }

    pub(crate) fn mem(&self, addr: u16) -> u8 {
        self.memory[usize::from(addr & ADDRESS_MASK)]
    }

    pub(crate) fn mem_mut(&mut self, addr: u16) -> &mut u8 {
        &mut self.memory[usize::from(addr & ADDRESS_MASK)]
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
