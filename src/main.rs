pub mod config;
pub mod event;
pub mod playback;
pub mod runtime;
pub mod summary;
pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{Config, ConfigStore, FileConfigStore};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use event::{EventStore, Metric};
use playback::{PlaybackError, PlaybackScheduler, PlaybackSignal, SignalSink};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use runtime::{AppEvent, CrosstermEventSource, EventPump};
use std::error::Error;
use std::io::{self, stdin};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use summary::{summarize_all, GroupSummary, SummaryError};

const TICK_RATE_MS: u64 = 25;
const TEMPO_STEP: f64 = 0.25;
const TEMPO_MIN: f64 = 0.25;
const TEMPO_MAX: f64 = 8.0;

/// kadence - a keystroke rhythm explorer for your terminal
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// directory containing the per-group keystroke CSV files
    #[clap(short = 'd', long, value_parser)]
    data_dir: Option<PathBuf>,

    /// metric shown in the box-plot view
    #[clap(short = 'm', long, value_enum)]
    metric: Option<Metric>,

    /// playback speed multiplier (must be positive)
    #[clap(short = 't', long, value_parser)]
    tempo: Option<f64>,

    /// print the per-group summary table to stdout and exit
    #[clap(long)]
    print_summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    BoxPlot,
    Replay,
}

/// Visual state of the replay screen, fed by playback signals.
#[derive(Debug, Default)]
pub struct ReplayState {
    pub pressed: bool,
    pub last_info: Option<(f64, f64)>,
    pub ended: bool,
}

impl SignalSink for ReplayState {
    fn emit(&mut self, signal: PlaybackSignal) {
        match signal {
            PlaybackSignal::PressStart { .. } => {
                self.pressed = true;
                self.ended = false;
            }
            PlaybackSignal::PressEnd { .. } => self.pressed = false,
            PlaybackSignal::EventInfo { hold, flight } => self.last_info = Some((hold, flight)),
            PlaybackSignal::SessionEnded => {
                self.pressed = false;
                self.ended = true;
            }
        }
    }
}

pub struct App {
    pub store: EventStore,
    pub metric: Metric,
    pub summaries: Vec<Result<GroupSummary, SummaryError>>,
    pub selected: usize,
    pub state: AppState,
    pub scheduler: PlaybackScheduler,
    pub replay: ReplayState,
}

impl App {
    pub fn new(store: EventStore, metric: Metric, tempo: f64) -> Result<Self, PlaybackError> {
        let summaries = summarize_all(&store, metric);
        Ok(Self {
            store,
            metric,
            summaries,
            selected: 0,
            state: AppState::BoxPlot,
            scheduler: PlaybackScheduler::new(tempo)?,
            replay: ReplayState::default(),
        })
    }

    pub fn toggle_metric(&mut self) {
        self.metric = self.metric.toggled();
        self.summaries = summarize_all(&self.store, self.metric);
    }

    pub fn select(&mut self, index: usize, now: Instant) {
        if index >= self.store.len() || index == self.selected {
            return;
        }
        self.selected = index;
        // Switching groups mid-replay supersedes the running session.
        if self.state == AppState::Replay {
            self.start_replay(now);
        }
    }

    pub fn select_next(&mut self, now: Instant) {
        let next = (self.selected + 1) % self.store.len().max(1);
        self.select(next, now);
    }

    pub fn select_prev(&mut self, now: Instant) {
        let len = self.store.len().max(1);
        let prev = (self.selected + len - 1) % len;
        self.select(prev, now);
    }

    pub fn start_replay(&mut self, now: Instant) {
        let events = self.store.groups()[self.selected].events.clone();
        let tempo = self.scheduler.tempo();
        self.replay = ReplayState::default();
        let _ = self.scheduler.start_session(events, tempo, now);
        self.state = AppState::Replay;
    }

    pub fn stop_replay(&mut self) {
        self.scheduler.stop();
        self.replay = ReplayState::default();
        self.state = AppState::BoxPlot;
    }

    pub fn nudge_tempo(&mut self, delta: f64) {
        let next = (self.scheduler.tempo() + delta).clamp(TEMPO_MIN, TEMPO_MAX);
        let _ = self.scheduler.set_tempo(next);
    }

    /// Fire any due playback transitions into the replay view state.
    pub fn on_tick(&mut self, now: Instant) {
        let Self {
            scheduler, replay, ..
        } = self;
        scheduler.poll(now, replay);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let saved = config_store.load();

    let metric = cli.metric.unwrap_or_else(|| saved.metric());
    let tempo = cli.tempo.unwrap_or(saved.tempo);
    if !(tempo.is_finite() && tempo > 0.0) {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::InvalidValue,
            format!("tempo must be a positive multiplier, got {tempo}"),
        )
        .exit();
    }

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| saved.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from("data"));

    let store = EventStore::load_dir(&data_dir)?;

    if cli.print_summary {
        print_summary(&store, metric);
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, metric, tempo)?;
    let result = run_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let _ = config_store.save(&Config {
        data_dir: Some(data_dir),
        metric: app.metric.to_string().to_lowercase(),
        tempo: app.scheduler.tempo(),
    });

    result
}

fn print_summary(store: &EventStore, metric: Metric) {
    println!("{metric} (ms) by medication group");
    for result in summarize_all(store, metric) {
        match result {
            Ok(s) => {
                let dropped = if s.excluded > 0 {
                    format!(" dropped={}", s.excluded)
                } else {
                    String::new()
                };
                println!(
                    "{:<10} n={:<6} min={:.1} q1={:.1} median={:.1} q3={:.1} max={:.1}{}",
                    s.group, s.count, s.min, s.q1, s.median, s.q3, s.max, dropped
                );
            }
            Err(err) => println!("{err}"),
        }
    }
}

fn run_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let pump = EventPump::new(
        CrosstermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        match pump.next() {
            AppEvent::Tick(at) => {
                if app.state == AppState::Replay {
                    app.on_tick(at);
                    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
                }
            }
            AppEvent::Resize => {
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
            AppEvent::Key(key) => {
                if handle_key(app, key) == KeyOutcome::Quit {
                    break;
                }
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn handle_key(app: &mut App, key: KeyEvent) -> KeyOutcome {
    if key.kind == KeyEventKind::Release {
        return KeyOutcome::Continue;
    }
    if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }

    let now = Instant::now();
    match key.code {
        KeyCode::Esc => match app.state {
            AppState::Replay => app.stop_replay(),
            AppState::BoxPlot => return KeyOutcome::Quit,
        },
        KeyCode::Char('b') if app.state == AppState::Replay => app.stop_replay(),
        KeyCode::Char('m') if app.state == AppState::BoxPlot => app.toggle_metric(),
        KeyCode::Left => app.select_prev(now),
        KeyCode::Right => app.select_next(now),
        KeyCode::Char(c @ '1'..='5') => {
            let index = c as usize - '1' as usize;
            app.select(index, now);
        }
        KeyCode::Enter | KeyCode::Char(' ') => app.start_replay(now),
        KeyCode::Char('+') | KeyCode::Char('=') => app.nudge_tempo(TEMPO_STEP),
        KeyCode::Char('-') | KeyCode::Char('_') => app.nudge_tempo(-TEMPO_STEP),
        _ => {}
    }
    KeyOutcome::Continue
}
