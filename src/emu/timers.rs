use super::{Chip8, SoundTrigger};

impl Chip8 {
    /// Decrements the delay and sound timers. Should be called at 60Hz.
    ///
    /// Returns a [`SoundTrigger`] on the tick where the sound timer goes from 1 to 0.
    pub fn timers_cycle(&mut self) -> Option<SoundTrigger> {
        self.delay_timer = self.delay_timer.saturating_sub(1);

        let expired = self.sound_timer == 1;
        self.sound_timer = self.sound_timer.saturating_sub(1);

        if expired {
            log::debug!("sound timer expired");
            Some(SoundTrigger)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_stop_at_zero() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.delay_timer = 2;

        chip8.timers_cycle();
        chip8.timers_cycle();
        chip8.timers_cycle();

        assert_eq!(chip8.delay_timer(), 0);
        assert_eq!(chip8.sound_timer(), 0);
    }

    #[test]
    fn sound_trigger_fires_once_on_expiry() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.sound_timer = 3;

        assert_eq!(chip8.timers_cycle(), None);
        assert_eq!(chip8.sound_timer(), 2);
        assert_eq!(chip8.timers_cycle(), None);
        assert_eq!(chip8.timers_cycle(), Some(SoundTrigger));
        assert_eq!(chip8.sound_timer(), 0);
        assert_eq!(chip8.timers_cycle(), None);
    }

    #[test]
    fn sound_timer_of_one_through_full_cycle() {
        // 6101 F118 1204
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0x61, 0x01, 0xF1, 0x18, 0x12, 0x04]).unwrap();

        assert_eq!(chip8.cycle().1, None);
        let (result, sound) = chip8.cycle();
        assert!(result.is_ok());
        assert_eq!(sound, Some(SoundTrigger));
        assert_eq!(chip8.sound_timer(), 0);

        assert_eq!(chip8.cycle().1, None);
    }
}
