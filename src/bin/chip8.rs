use std::{
    fs::File,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

use chip8_vm::{
    emu::{Chip8, Chip8Runner, DISPLAY_X, DISPLAY_Y, RunMode, RunnerConfig},
    u4,
};

/// Mapping from keyboard keys to CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::Char('x'), // 0x0
    KeyCode::Char('1'), // 0x1
    KeyCode::Char('2'), // 0x2
    KeyCode::Char('3'), // 0x3
    KeyCode::Char('q'), // 0x4
    KeyCode::Char('w'), // 0x5
    KeyCode::Char('e'), // 0x6
    KeyCode::Char('a'), // 0x7
    KeyCode::Char('s'), // 0x8
    KeyCode::Char('d'), // 0x9
    KeyCode::Char('z'), // 0xA
    KeyCode::Char('c'), // 0xB
    KeyCode::Char('4'), // 0xC
    KeyCode::Char('r'), // 0xD
    KeyCode::Char('f'), // 0xE
    KeyCode::Char('v'), // 0xF
];

// Key release events are not fired in terminals on Linux.
// To handle this, we implement a timeout after which we consider a key released.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(50);

const FRAME_TIME: Duration = Duration::from_millis(16);

struct App {
    runner: Chip8Runner,
    should_quit: bool,
    last_tick: Instant,
    key_press_times: [Option<Instant>; 16],
    /// Rendered copy of the display, refreshed only when the machine requests a redraw.
    frame: Vec<Line<'static>>,
    beeps: u32,
    status: String,
}

impl App {
    fn new(rom: &[u8], seed: Option<u64>, config: RunnerConfig) -> anyhow::Result<Self> {
        let mut chip8 = seed.map_or_else(Chip8::new, Chip8::with_seed);
        let loaded = chip8
            .load(rom)
            .context("Failed to load ROM into CHIP-8 memory")?;
        log::info!("loaded {loaded} byte ROM");

        Ok(Self {
            runner: Chip8Runner::new(chip8, config).context("Invalid runner configuration")?,
            should_quit: false,
            last_tick: Instant::now(),
            key_press_times: [None; 16],
            frame: Vec::new(),
            beeps: 0,
            status: String::new(),
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.should_quit {
            let dt = self.last_tick.elapsed().as_secs_f32();
            self.last_tick = Instant::now();

            let report = self
                .runner
                .update(dt)
                .context("Chip8 Execution error")?;

            if report.sound_triggered {
                log::info!("beep");
                self.beeps += 1;
            }

            if self.runner.chip8_mut().take_redraw() || self.frame.is_empty() {
                self.frame = render_frame(self.runner.chip8_ref());
            }
            self.status = status_line(self.runner.chip8_ref(), self.beeps);

            terminal
                .draw(|frame| self.draw(frame))
                .context("Failed to draw terminal frame")?;

            self.check_key_timeout();

            if event::poll(FRAME_TIME).context("Failed to poll terminal events")?
                && let Event::Key(key) = event::read().context("Failed to read terminal event")?
            {
                self.handle_key_event(key);
            }
        }

        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn check_key_timeout(&mut self) {
        let now = Instant::now();

        for (idx, press_time) in self.key_press_times.iter_mut().enumerate() {
            if let Some(time) = press_time
                && now.duration_since(*time) > KEY_RELEASE_TIMEOUT
            {
                *press_time = None;
                self.runner.set_key(u4::new(idx as u8), false);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        if key.kind == KeyEventKind::Release {
            return;
        }

        if let Some(idx) = KEY_MAP.iter().position(|&k| k == key.code) {
            self.runner.set_key(u4::new(idx as u8), true);
            self.key_press_times[idx] = Some(Instant::now());
        }
    }
}

fn render_frame(chip8: &Chip8) -> Vec<Line<'static>> {
    chip8
        .display()
        .iter()
        .map(|row| {
            let text: String = row
                .iter()
                .map(|&pixel| if pixel != 0 { '█' } else { ' ' })
                .collect();
            Line::from(Span::styled(text, Style::default().fg(Color::Green)))
        })
        .collect()
}

fn status_line(chip8: &Chip8, beeps: u32) -> String {
    let mode = match chip8.mode() {
        RunMode::Running => "RUN".to_string(),
        RunMode::WaitingForKey { x } => format!("KEY->V{x}"),
    };

    format!(
        "PC {:03X}  I {:03X}  DT {:02X}  ST {:02X}  {mode}  beeps {beeps}",
        chip8.pc(),
        chip8.i(),
        chip8.delay_timer(),
        chip8.sound_timer(),
    )
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Check if we have enough space
        const MIN_WIDTH: u16 = DISPLAY_X as u16 + 2;
        const MIN_HEIGHT: u16 = DISPLAY_Y as u16 + 2 + 1;
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            Paragraph::new(format!(
                "Terminal is too small ({}x{} min)",
                MIN_WIDTH, MIN_HEIGHT
            ))
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .render(area, buf);

            return;
        }

        let [display, status] = Layout::vertical([
            Constraint::Length(DISPLAY_Y as u16 + 2),
            Constraint::Length(1),
        ])
        .areas(area);

        Paragraph::new(self.frame.clone())
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" CHIP-8 "))
            .render(display, buf);

        Paragraph::new(self.status.as_str())
            .alignment(Alignment::Center)
            .render(status, buf);
    }
}

/// CHIP-8 emulator for the terminal.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = 700.0)]
    cpu_hz: f32,

    /// Timer decrements per second
    #[arg(long, default_value_t = 60.0)]
    timer_hz: f32,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Stop on unsupported opcodes instead of skipping the frame
    #[arg(long)]
    strict: bool,

    /// Write logs to this file, filtered by RUST_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    // The terminal belongs to the renderer, so logs only go to a file
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = File::create(path).context("Failed to create log file")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("Failed to initialize logger")?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let config = RunnerConfig {
        cpu_hz: args.cpu_hz,
        timer_hz: args.timer_hz,
        halt_on_unsupported: args.strict,
    };

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;
    let mut app = App::new(&rom, args.seed, config).context("Failed to initialize application")?;

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    app_result
}
