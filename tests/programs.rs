//! Whole programs run through the public API.

use chip8_vm::{
    emu::{Chip8, Chip8Error, Chip8Result, RunMode, SoundTrigger},
    u4,
};

fn boot(program: &[u16]) -> Chip8 {
    let rom: Vec<u8> = program.iter().flat_map(|op| op.to_be_bytes()).collect();
    let mut chip8 = Chip8::with_seed(42);
    assert_eq!(chip8.load(&rom), Ok(rom.len()));
    chip8
}

fn run(chip8: &mut Chip8, cycles: usize) {
    for _ in 0..cycles {
        chip8.cycle().0.unwrap();
    }
}

fn lit(chip8: &Chip8, row: usize) -> Vec<usize> {
    (0..64).filter(|&x| chip8.get_display_pixel(row, x)).collect()
}

#[test]
fn draws_font_glyph() {
    let mut chip8 = boot(&[
        0x6007, // LD V0, 7
        0xF029, // LD F, V0
        0x6100, // LD V1, 0
        0xD115, // DRW V1, V1, 5
        0x1208, // JP 208
    ]);
    assert!(chip8.take_redraw());

    run(&mut chip8, 4);

    assert!(chip8.take_redraw());
    assert_eq!(lit(&chip8, 0), vec![0, 1, 2, 3]);
    assert_eq!(lit(&chip8, 1), vec![3]);
    assert_eq!(lit(&chip8, 2), vec![2]);
    assert_eq!(lit(&chip8, 3), vec![1]);
    assert_eq!(lit(&chip8, 4), vec![1]);
    assert_eq!(chip8.v()[0xF], 0);

    run(&mut chip8, 10);
    assert_eq!(chip8.pc(), 0x208);
    assert!(!chip8.take_redraw());
}

#[test]
fn bcd_then_load_registers() {
    let mut chip8 = boot(&[
        0x60FE, // LD V0, 254
        0xA300, // LD I, 300
        0xF033, // LD B, V0
        0xF265, // LD V2, [I]
        0x1208, // JP 208
    ]);

    run(&mut chip8, 4);

    assert_eq!(&chip8.v()[..3], &[2, 5, 4]);
    assert_eq!(chip8.i(), 0x303);
    assert_eq!(&chip8.memory()[0x300..0x303], &[2, 5, 4]);
}

#[test]
fn nested_subroutines_unwind() {
    let mut chip8 = boot(&[
        0x2206, // 200: CALL 206
        0x6A01, // 202: LD VA, 1
        0x1204, // 204: JP 204
        0x220C, // 206: CALL 20C
        0x6B02, // 208: LD VB, 2
        0x00EE, // 20A: RET
        0x6C03, // 20C: LD VC, 3
        0x00EE, // 20E: RET
    ]);

    run(&mut chip8, 2);
    assert_eq!(chip8.stack(), &[0x200, 0x206]);

    run(&mut chip8, 6);
    assert!(chip8.stack().is_empty());
    assert_eq!(chip8.pc(), 0x204);
    assert_eq!(&chip8.v()[0xA..0xD], &[1, 2, 3]);
}

#[test]
fn delay_timer_countdown_loop() {
    let mut chip8 = boot(&[
        0x6005, // 200: LD V0, 5
        0xF015, // 202: LD DT, V0
        0xF107, // 204: LD V1, DT
        0x3100, // 206: SE V1, 0
        0x1204, // 208: JP 204
        0x120A, // 20A: JP 20A
    ]);

    let mut cycles = 0;
    while chip8.pc() != 0x20A {
        chip8.cycle().0.unwrap();
        cycles += 1;
        assert!(cycles < 100, "countdown never finished");
    }

    assert_eq!(chip8.delay_timer(), 0);
    assert_eq!(chip8.v()[1], 0);
}

#[test]
fn sound_fires_once_per_expiry() {
    let mut chip8 = boot(&[
        0x6001, // LD V0, 1
        0xF018, // LD ST, V0
        0x1204, // JP 204
    ]);

    let triggers: Vec<Option<SoundTrigger>> = (0..5).map(|_| chip8.cycle().1).collect();

    assert_eq!(triggers, vec![None, Some(SoundTrigger), None, None, None]);
    assert_eq!(chip8.sound_timer(), 0);
}

#[test]
fn wait_for_key_holds_program() {
    let mut chip8 = boot(&[
        0xF40A, // LD V4, K
        0x6501, // LD V5, 1
        0x1204, // JP 204
    ]);

    for _ in 0..5 {
        assert_eq!(chip8.cycle().0, Ok(Chip8Result::WaitingForKey));
    }
    assert_eq!(chip8.pc(), 0x200);
    assert_eq!(chip8.v()[5], 0);

    let mut keypad = [false; 16];
    keypad[0x9] = true;
    keypad[0xF] = true;
    chip8.set_keypad(keypad);

    run(&mut chip8, 2);
    assert_eq!(chip8.v()[4], 0x9);
    assert_eq!(chip8.v()[5], 1);
    assert_eq!(chip8.mode(), RunMode::Running);
}

#[test]
fn key_skip_reads_keypad_indexed_by_register() {
    let mut chip8 = boot(&[
        0x6A0B, // 200: LD VA, B
        0xEA9E, // 202: SKP VA
        0x6101, // 204: LD V1, 1
        0x6202, // 206: LD V2, 2
    ]);
    chip8.set_key(u4::new(0xB), true);

    run(&mut chip8, 3);

    assert_eq!(chip8.v()[1], 0);
    assert_eq!(chip8.v()[2], 2);
}

#[test]
fn unsupported_opcode_does_not_advance() {
    let mut chip8 = boot(&[0x6001, 0x5121]);
    run(&mut chip8, 1);

    for _ in 0..3 {
        let (result, _) = chip8.cycle();
        assert_eq!(
            result,
            Err(Chip8Error::UnsupportedOpcode {
                opcode: 0x5121,
                address: 0x202,
            })
        );
    }
    assert_eq!(chip8.pc(), 0x202);
    assert_eq!(chip8.v()[0], 1);
}

#[test]
fn reset_restores_power_on_state() {
    let mut chip8 = boot(&[0x6001, 0xA000, 0xD005, 0x2200]);
    run(&mut chip8, 4);

    let mut fresh = Chip8::with_seed(0);
    chip8.reset();

    assert_eq!(chip8.memory(), fresh.memory());
    assert_eq!(chip8.display(), fresh.display());
    assert_eq!(chip8.v(), fresh.v());
    assert_eq!(chip8.pc(), fresh.pc());
    assert_eq!(chip8.i(), fresh.i());
    assert!(chip8.stack().is_empty());
    assert_eq!(chip8.take_redraw(), fresh.take_redraw());
}
