use super::{Chip8, Chip8Error, Chip8Result};
use crate::u4;

/// Pacing settings for [`Chip8Runner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Instructions executed per second.
    pub cpu_hz: f32,
    /// Timer decrements per second.
    pub timer_hz: f32,
    /// Stop with an error on unsupported opcodes instead of logging and retrying.
    pub halt_on_unsupported: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 700.0,
            timer_hz: 60.0,
            halt_on_unsupported: false,
        }
    }
}

/// What happened during one [`Chip8Runner::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerReport {
    /// CPU cycles executed.
    pub cycles: u32,
    /// The display changed and should be rendered.
    pub redraw: bool,
    /// The sound timer expired during this update.
    pub sound_triggered: bool,
}

/// High-level emulator runner that manages timing internally.
pub struct Chip8Runner {
    chip8: Chip8,
    config: RunnerConfig,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

impl Chip8Runner {
    /// Wraps a machine for paced execution.
    ///
    /// Both clock rates must be finite and positive, otherwise `update` could never catch up.
    pub fn new(chip8: Chip8, config: RunnerConfig) -> Result<Self, Chip8Error> {
        for (clock, hz) in [("cpu", config.cpu_hz), ("timer", config.timer_hz)] {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(Chip8Error::InvalidClockRate { clock, hz });
            }
        }

        Ok(Self {
            chip8,
            config,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        })
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles and timer updates as needed based on the elapsed time `dt`.
    /// Stops early once the display changed so every frame gets rendered.
    pub fn update(&mut self, dt: f32) -> Result<RunnerReport, Chip8Error> {
        let cpu_time_step = 1.0 / self.config.cpu_hz;
        let timer_time_step = 1.0 / self.config.timer_hz;

        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        let mut report = RunnerReport::default();

        while self.timer_dt_accumulator >= timer_time_step {
            self.timer_dt_accumulator -= timer_time_step;
            if self.chip8.timers_cycle().is_some() {
                report.sound_triggered = true;
            }
        }

        while self.cpu_dt_accumulator >= cpu_time_step {
            self.cpu_dt_accumulator -= cpu_time_step;
            report.cycles += 1;

            match self.chip8.cpu_cycle() {
                Ok(Chip8Result::Continue) => {}
                Ok(Chip8Result::Redraw) => {
                    // We clear the accumulator to avoid "catching up" in the next frame.
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                Ok(Chip8Result::WaitingForKey) => {
                    // Nothing changes until the host delivers input
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                Err(Chip8Error::UnsupportedOpcode { .. }) if !self.config.halt_on_unsupported => {
                    // Already logged; PC did not move, so the same word is retried next frame
                    self.cpu_dt_accumulator = 0.0;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        report.redraw = self.chip8.needs_redraw();
        Ok(report)
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(rom: &[u8], config: RunnerConfig) -> Chip8Runner {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(rom).unwrap();
        chip8.take_redraw();
        Chip8Runner::new(chip8, config).unwrap()
    }

    #[test]
    fn rejects_unusable_clock_rates() {
        let cases = [
            (-60.0, 60.0, "cpu"),
            (0.0, 60.0, "cpu"),
            (f32::INFINITY, 60.0, "cpu"),
            (700.0, -1.0, "timer"),
            (700.0, f32::NAN, "timer"),
        ];

        for (cpu_hz, timer_hz, expected_clock) in cases {
            let config = RunnerConfig {
                cpu_hz,
                timer_hz,
                ..Default::default()
            };
            match Chip8Runner::new(Chip8::with_seed(0), config) {
                Err(Chip8Error::InvalidClockRate { clock, .. }) => {
                    assert_eq!(clock, expected_clock)
                }
                Err(e) => panic!("unexpected error: {e}"),
                Ok(_) => panic!("accepted cpu_hz={cpu_hz} timer_hz={timer_hz}"),
            }
        }
    }

    #[test]
    fn runs_cycles_at_cpu_rate() {
        // 1200: spin forever
        let config = RunnerConfig {
            cpu_hz: 100.0,
            timer_hz: 10.0,
            ..Default::default()
        };
        let mut runner = runner_with(&[0x12, 0x00], config);

        let report = runner.update(0.105).unwrap();
        assert_eq!(report.cycles, 10);
        assert!(!report.redraw);
    }

    #[test]
    fn timers_tick_at_timer_rate() {
        // 6005 F015 1204
        let config = RunnerConfig {
            cpu_hz: 1000.0,
            timer_hz: 10.0,
            ..Default::default()
        };
        let mut runner = runner_with(&[0x60, 0x05, 0xF0, 0x15, 0x12, 0x04], config);

        runner.update(0.0025).unwrap();
        assert_eq!(runner.chip8_ref().delay_timer(), 5);

        runner.update(0.2).unwrap();
        assert_eq!(runner.chip8_ref().delay_timer(), 3);
    }

    #[test]
    fn stops_batch_after_draw() {
        // D001 1200
        let mut runner = runner_with(&[0xD0, 0x01, 0x12, 0x00], RunnerConfig::default());

        let report = runner.update(1.0).unwrap();
        assert_eq!(report.cycles, 1);
        assert!(report.redraw);
        assert_eq!(runner.chip8_ref().pc(), 0x202);
    }

    #[test]
    fn unsupported_opcode_is_retried_by_default() {
        let mut runner = runner_with(&[0x00, 0x00], RunnerConfig::default());

        assert!(runner.update(1.0).is_ok());
        assert!(runner.update(1.0).is_ok());
        assert_eq!(runner.chip8_ref().pc(), 0x200);
    }

    #[test]
    fn unsupported_opcode_halts_when_configured() {
        let config = RunnerConfig {
            halt_on_unsupported: true,
            ..Default::default()
        };
        let mut runner = runner_with(&[0x00, 0x00], config);

        assert_eq!(
            runner.update(1.0),
            Err(Chip8Error::UnsupportedOpcode {
                opcode: 0x0000,
                address: 0x200,
            })
        );
    }

    #[test]
    fn stack_errors_are_always_returned() {
        let mut runner = runner_with(&[0x00, 0xEE], RunnerConfig::default());
        assert!(matches!(
            runner.update(1.0),
            Err(Chip8Error::StackUnderflow { .. })
        ));
    }

    #[test]
    fn reports_sound_trigger() {
        // 6001 F018 1204
        let config = RunnerConfig {
            cpu_hz: 1000.0,
            timer_hz: 10.0,
            ..Default::default()
        };
        let mut runner = runner_with(&[0x60, 0x01, 0xF0, 0x18, 0x12, 0x04], config);

        assert!(!runner.update(0.0025).unwrap().sound_triggered);
        assert_eq!(runner.chip8_ref().sound_timer(), 1);
        assert!(runner.update(0.1).unwrap().sound_triggered);
        assert_eq!(runner.chip8_ref().sound_timer(), 0);
    }
}
