use rand::Rng;

use super::{
    Chip8, Chip8Error, DISPLAY_X, DISPLAY_Y, FONT_GLYPH_SIZE, FONT_START_ADDRESS, Opcode,
    OpcodeALU, RunMode, STACK_DEPTH,
};
use crate::u4;

/// How the program counter moves after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcUpdate {
    /// Advance to the following instruction.
    Next,
    /// Skip the following instruction.
    Skip,
    /// Continue at an absolute address.
    Jump(u16),
    /// Stay on this instruction; the machine waits for input.
    Wait,
}

impl PcUpdate {
    fn skip_if(condition: bool) -> Self {
        if condition { PcUpdate::Skip } else { PcUpdate::Next }
    }
}

impl Chip8 {
    /// Performs the state transition of a single instruction.
    ///
    /// PC is left for the caller to update according to the returned [`PcUpdate`].
    /// On error nothing has been modified.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<PcUpdate, Chip8Error> {
        let update = match opcode {
            Opcode::ClearDisplay => {
                self.display.iter_mut().for_each(|row| row.fill(0));
                self.redraw = true;
                PcUpdate::Next
            }
            Opcode::Jump { nnn } => PcUpdate::Jump(nnn),
            Opcode::JumpWithOffset { nnn } => PcUpdate::Jump(nnn.wrapping_add(self.v[0].into())),
            Opcode::Call { nnn } => {
                let sp = usize::from(self.sp);
                if sp >= STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow { address: self.pc });
                }
                self.stack[sp] = self.pc;
                self.sp += 1;
                PcUpdate::Jump(nnn)
            }
            Opcode::Return => {
                if self.sp == 0 {
                    return Err(Chip8Error::StackUnderflow { address: self.pc });
                }
                self.sp -= 1;
                // Resume after the call instruction
                PcUpdate::Jump(self.stack[usize::from(self.sp)].wrapping_add(2))
            }
            Opcode::SkipRegEqualImm { x, nn } => PcUpdate::skip_if(self.v[x] == nn),
            Opcode::SkipRegNotEqualImm { x, nn } => PcUpdate::skip_if(self.v[x] != nn),
            Opcode::SkipRegEqualReg { x, y } => PcUpdate::skip_if(self.v[x] == self.v[y]),
            Opcode::SkipRegNotEqualReg { x, y } => PcUpdate::skip_if(self.v[x] != self.v[y]),
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
                PcUpdate::Next
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
                PcUpdate::Next
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
                PcUpdate::Next
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & nn;
                PcUpdate::Next
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
                PcUpdate::Next
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
                PcUpdate::Next
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n);
                PcUpdate::Next
            }
            Opcode::SkipIfPressed { x } => {
                PcUpdate::skip_if(self.keypad[u4::from_low_bits(self.v[x])])
            }
            Opcode::SkipIfNotPressed { x } => {
                PcUpdate::skip_if(!self.keypad[u4::from_low_bits(self.v[x])])
            }
            Opcode::WaitForKey { x } => self.execute_wait_for_key(x),
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
                PcUpdate::Next
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
                PcUpdate::Next
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
                PcUpdate::Next
            }
            Opcode::FontChar { x } => {
                self.i = FONT_START_ADDRESS as u16 + u16::from(self.v[x]) * FONT_GLYPH_SIZE as u16;
                PcUpdate::Next
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                *self.mem_mut(self.i) = value / 100;
                *self.mem_mut(self.i.wrapping_add(1)) = (value / 10) % 10;
                *self.mem_mut(self.i.wrapping_add(2)) = value % 10;
                PcUpdate::Next
            }
            Opcode::StoreRegs { x } => {
                for reg_index in 0..=u8::from(x) {
                    *self.mem_mut(self.i.wrapping_add(reg_index.into())) =
                        self.v[usize::from(reg_index)];
                }
                self.i = self.i.wrapping_add(u16::from(u8::from(x)) + 1);
                PcUpdate::Next
            }
            Opcode::LoadRegs { x } => {
                for reg_index in 0..=u8::from(x) {
                    self.v[usize::from(reg_index)] =
                        self.mem(self.i.wrapping_add(reg_index.into()));
                }
                self.i = self.i.wrapping_add(u16::from(u8::from(x)) + 1);
                PcUpdate::Next
            }
            Opcode::Unknown(opcode) => {
                return Err(Chip8Error::UnsupportedOpcode {
                    opcode,
                    address: self.pc,
                });
            }
        };

        Ok(update)
    }

    // VF is written before the result, so with x == F the result is what remains.
    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[0xF] = u8::from(overflow);
                self.v[x] = res;
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[0xF] = u8::from(!borrow); // Notice that borrow is inverted
                self.v[x] = res;
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[0xF] = u8::from(!borrow);
                self.v[x] = res;
            }
            OpcodeALU::ShiftRight => {
                let value = self.v[x];
                self.v[0xF] = value & 1;
                self.v[x] = value >> 1;
            }
            OpcodeALU::ShiftLeft => {
                let value = self.v[x];
                self.v[0xF] = value >> 7;
                self.v[x] = value << 1;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let x_pos = usize::from(self.v[x]);
        let y_pos = usize::from(self.v[y]);

        self.v[0xF] = 0;
        for row in 0..usize::from(n) {
            let sprite_byte = self.mem(self.i.wrapping_add(row as u16));
            let cell_y = (y_pos + row) % DISPLAY_Y;

            for col in 0..8 {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let pixel = &mut self.display[cell_y][(x_pos + col) % DISPLAY_X];

                    if *pixel == 1 {
                        self.v[0xF] = 1;
                    }
                    *pixel ^= 1;
                }
            }
        }

        self.redraw = true;
    }

    fn execute_wait_for_key(&mut self, x: u4) -> PcUpdate {
        match self.keypad.iter().position(|&pressed| pressed) {
            Some(key) => {
                self.v[x] = key as u8;
                PcUpdate::Next
            }
            None => {
                // The cycle driver re-checks the keypad until a key shows up
                self.mode = RunMode::WaitingForKey { x };
                PcUpdate::Wait
            }
        }
    }
}
