use blink::{
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    db::{GameSummaryRow, HistoryRow, ScoreDb},
    gateway::Recorder,
    memory::MemoryGame,
    notice::{Notice, NoticeBoard},
    reaction::{ReactionGame, RoundState},
    runtime::{
        BlinkEvent, CrosstermEventSource, FixedTicker, Runner, ThreadScheduler, TriggerScheduler,
    },
    ui::{HistoryView, MemoryView, NoticeBar, ReactionView, SummaryView, MEMORY_GRID_COLS},
};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    execute,
    event::{KeyCode, KeyEvent, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, Sender},
    time::Duration,
};
use webbrowser::Browser;

const TICK_RATE_MS: u64 = 100;
const HISTORY_PAGE: usize = 200;

/// terminal reaction trainer with pair-matching practice and score history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal reaction trainer: wait for the signal, act fast, and track your latencies across sessions. Includes a pair-matching memory board and a persistent score history."
)]
pub struct Cli {
    /// record scores under this player name (omit to play as guest)
    #[clap(short, long)]
    user: Option<String>,

    /// mini-game to launch
    #[clap(short, long, value_enum, default_value_t = GameChoice::Reaction)]
    game: GameChoice,

    /// lower bound of the random arm delay, in milliseconds
    #[clap(long)]
    min_delay_ms: Option<u64>,

    /// upper bound (exclusive) of the random arm delay, in milliseconds
    #[clap(long)]
    max_delay_ms: Option<u64>,

    /// number of card pairs on the memory board
    #[clap(long)]
    pairs: Option<usize>,

    /// alternate score database path
    #[clap(long)]
    db: Option<PathBuf>,

    /// print recorded plays as CSV and exit
    #[clap(long)]
    export: bool,

    /// delete all recorded plays and exit
    #[clap(long)]
    clear: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum GameChoice {
    Reaction,
    Memory,
}

impl Cli {
    /// Merge flags over the stored config; flags win
    fn apply_to(&self, cfg: &mut Config) {
        if self.user.is_some() {
            cfg.user = self.user.clone();
        }
        if let Some(min) = self.min_delay_ms {
            cfg.min_delay_ms = min;
        }
        if let Some(max) = self.max_delay_ms {
            cfg.max_delay_ms = max;
        }
        if let Some(pairs) = self.pairs {
            cfg.pairs = pairs;
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("blink_scores.db"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppScreen {
    Game,
    Summary,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistorySort {
    Time,
    Game,
    Score,
}

pub struct App {
    pub screen: AppScreen,
    pub active: GameChoice,
    pub reaction: ReactionGame,
    pub memory: MemoryGame,
    pub memory_cursor: usize,
    pub notices: NoticeBoard,
    notice_rx: Receiver<Notice>,
    history_db: Option<ScoreDb>,
    pub history_rows: Vec<HistoryRow>,
    pub history_summaries: Vec<GameSummaryRow>,
    pub history_scroll: usize,
    pub history_sort: HistorySort,
    pub history_ascending: bool,
}

impl App {
    pub fn new(cli: &Cli, config: Config) -> Self {
        let db_path = cli.db_path();
        let (notice_tx, notice_rx) = std::sync::mpsc::channel();

        // one connection per recorder; sqlite arbitrates the shared file
        let mut db_warned = false;
        let reaction_recorder = open_score_db(&db_path, &notice_tx, &mut db_warned)
            .map(|db| Recorder::spawn(db, notice_tx.clone()));
        let memory_recorder = open_score_db(&db_path, &notice_tx, &mut db_warned)
            .map(|db| Recorder::spawn(db, notice_tx.clone()));
        let history_db = open_score_db(&db_path, &notice_tx, &mut db_warned);

        let reaction = ReactionGame::with_delay_range(
            config.user.clone(),
            reaction_recorder,
            config.min_delay_ms,
            config.max_delay_ms,
        );
        let memory = MemoryGame::new(config.user.clone(), memory_recorder, config.pairs);

        Self {
            screen: AppScreen::Game,
            active: cli.game,
            reaction,
            memory,
            memory_cursor: 0,
            notices: NoticeBoard::new(),
            notice_rx,
            history_db,
            history_rows: Vec::new(),
            history_summaries: Vec::new(),
            history_scroll: 0,
            history_sort: HistorySort::Time,
            history_ascending: false,
        }
    }

    /// Pull recorder outcomes into the notice board
    fn drain_notices(&mut self, clock: &impl Clock) {
        while let Ok(notice) = self.notice_rx.try_recv() {
            self.notices.push(notice, clock);
        }
    }

    fn on_tick(&mut self, clock: &impl Clock) {
        self.memory.on_tick(clock);
        self.notices.on_tick(clock);
    }

    fn open_history(&mut self) {
        if let Some(db) = &self.history_db {
            self.history_rows = db.recent_sessions(HISTORY_PAGE).unwrap_or_default();
            self.history_summaries = db.game_summaries().unwrap_or_default();
        }
        self.history_scroll = 0;
        self.apply_history_sort();
        self.screen = AppScreen::History;
    }

    fn set_history_sort(&mut self, sort: HistorySort) {
        if self.history_sort == sort {
            self.history_ascending = !self.history_ascending;
        } else {
            self.history_sort = sort;
            self.history_ascending = false;
        }
        self.history_scroll = 0;
        self.apply_history_sort();
    }

    fn apply_history_sort(&mut self) {
        match self.history_sort {
            HistorySort::Time => self.history_rows.sort_by_key(|r| r.timestamp),
            HistorySort::Game => self
                .history_rows
                .sort_by(|a, b| a.game_title.cmp(&b.game_title).then(a.timestamp.cmp(&b.timestamp))),
            HistorySort::Score => self.history_rows.sort_by_key(|r| r.score),
        }
        if !self.history_ascending {
            self.history_rows.reverse();
        }
    }
}

/// Open the score database, surfacing the first failure on the notice
/// channel so a signed-in player sees why nothing gets saved.
fn open_score_db(path: &Path, notice_tx: &Sender<Notice>, warned: &mut bool) -> Option<ScoreDb> {
    match ScoreDb::open(path) {
        Ok(db) => Some(db),
        Err(err) => {
            if !*warned {
                *warned = true;
                let _ = notice_tx.send(Notice::error(format!(
                    "Failed to open score database: {err}"
                )));
            }
            None
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.export {
        let db = ScoreDb::open(&cli.db_path())?;
        db.export_csv(io::stdout())?;
        return Ok(());
    }

    if cli.clear {
        let db = ScoreDb::open(&cli.db_path())?;
        db.clear_sessions()?;
        println!("score history cleared");
        return Ok(());
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);
    if let Err(err) = config_store.save(&config) {
        eprintln!("warning: settings not saved: {err}");
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

    let mut app = App::new(&cli, config);
    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let clock = SystemClock;
    let events = CrosstermEventSource::new();
    let scheduler = ThreadScheduler::new(events.sender());
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    // surface startup notices (e.g. an unopenable db) on the first frame
    app.drain_notices(&clock);
    terminal.draw(|f| draw(app, f))?;

    loop {
        match runner.step() {
            BlinkEvent::Tick => {
                app.on_tick(&clock);
            }
            BlinkEvent::Trigger(token) => {
                app.reaction.trigger_fired(token, &clock);
            }
            BlinkEvent::Resize => {}
            BlinkEvent::Key(key) => {
                if is_quit(&key, app) {
                    break;
                }
                handle_key(app, key, &clock, &scheduler);
            }
        }

        app.drain_notices(&clock);
        terminal.draw(|f| draw(app, f))?;
    }

    Ok(())
}

/// Esc quits from the game screen and backs out of overlays; ctrl+c
/// always quits.
fn is_quit(key: &KeyEvent, app: &App) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    key.code == KeyCode::Esc && app.screen == AppScreen::Game
}

fn handle_key(app: &mut App, key: KeyEvent, clock: &impl Clock, scheduler: &impl TriggerScheduler) {
    if key.code == KeyCode::Char('d') {
        app.notices.dismiss_all();
        return;
    }
    match app.screen {
        AppScreen::Game => match app.active {
            GameChoice::Reaction => handle_reaction_key(app, key, clock, scheduler),
            GameChoice::Memory => handle_memory_key(app, key, clock),
        },
        AppScreen::Summary => match key.code {
            KeyCode::Char('b') | KeyCode::Esc | KeyCode::Backspace => {
                app.screen = AppScreen::Game;
            }
            KeyCode::Char('t') => share_best(app),
            _ => {}
        },
        AppScreen::History => match key.code {
            KeyCode::Char('b') | KeyCode::Esc | KeyCode::Backspace => {
                app.screen = AppScreen::Game;
            }
            KeyCode::Up => {
                app.history_scroll = app.history_scroll.saturating_sub(1);
            }
            KeyCode::Down => {
                if app.history_scroll + 1 < app.history_rows.len() {
                    app.history_scroll += 1;
                }
            }
            KeyCode::PageUp => {
                app.history_scroll = app.history_scroll.saturating_sub(10);
            }
            KeyCode::PageDown => {
                app.history_scroll =
                    (app.history_scroll + 10).min(app.history_rows.len().saturating_sub(1));
            }
            KeyCode::Home => {
                app.history_scroll = 0;
            }
            KeyCode::Char('1') => app.set_history_sort(HistorySort::Time),
            KeyCode::Char('2') => app.set_history_sort(HistorySort::Game),
            KeyCode::Char('3') => app.set_history_sort(HistorySort::Score),
            _ => {}
        },
    }
}

fn handle_reaction_key(
    app: &mut App,
    key: KeyEvent,
    clock: &impl Clock,
    scheduler: &impl TriggerScheduler,
) {
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => {
            app.reaction.handle_action(clock, scheduler);
        }
        KeyCode::Char('s') => {
            app.screen = AppScreen::Summary;
        }
        KeyCode::Char('h') => {
            app.open_history();
        }
        KeyCode::Char('t') => {
            if app.reaction.state() == RoundState::Resolved {
                share_best(app);
            }
        }
        KeyCode::Tab => {
            app.active = GameChoice::Memory;
        }
        _ => {}
    }
}

fn handle_memory_key(app: &mut App, key: KeyEvent, clock: &impl Clock) {
    let len = app.memory.len();
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => {
            app.memory.flip(app.memory_cursor, clock);
        }
        KeyCode::Left => {
            app.memory_cursor = app.memory_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            if app.memory_cursor + 1 < len {
                app.memory_cursor += 1;
            }
        }
        KeyCode::Up => {
            app.memory_cursor = app.memory_cursor.saturating_sub(MEMORY_GRID_COLS);
        }
        KeyCode::Down => {
            if app.memory_cursor + MEMORY_GRID_COLS < len {
                app.memory_cursor += MEMORY_GRID_COLS;
            }
        }
        KeyCode::Char('r') => {
            app.memory.restart();
            app.memory_cursor = 0;
        }
        KeyCode::Char('h') => {
            app.open_history();
        }
        KeyCode::Tab => {
            app.active = GameChoice::Reaction;
        }
        _ => {}
    }
}

fn share_best(app: &App) {
    let summary = app.reaction.summary();
    if summary.count == 0 {
        return;
    }
    if Browser::is_available() {
        webbrowser::open(&blink::ui::share_url(summary.best_ms, summary.count)).unwrap_or_default();
    }
}

fn draw(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)].as_ref())
        .split(f.area());

    match app.screen {
        AppScreen::Game => match app.active {
            GameChoice::Reaction => {
                f.render_widget(ReactionView { game: &app.reaction }, chunks[0]);
            }
            GameChoice::Memory => {
                f.render_widget(
                    MemoryView {
                        game: &app.memory,
                        cursor: app.memory_cursor,
                    },
                    chunks[0],
                );
            }
        },
        AppScreen::Summary => {
            f.render_widget(
                SummaryView {
                    summary: app.reaction.summary(),
                    samples: app.reaction.session().samples(),
                },
                chunks[0],
            );
        }
        AppScreen::History => {
            f.render_widget(
                HistoryView {
                    rows: &app.history_rows,
                    summaries: &app.history_summaries,
                    scroll: app.history_scroll,
                },
                chunks[0],
            );
        }
    }

    f.render_widget(
        NoticeBar {
            notices: app.notices.visible().collect(),
        },
        chunks[1],
    );
}
