use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keydrill::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    drill::DrillGenerator,
    history::{self, HistoryStore, MemoryHistory, SqliteHistory},
    logging,
    record::ErrorMap,
    runtime::{logical_key, AppEvent, CrosstermEventSource, FixedTicker, Runner},
    suggest::{rank, Suggestion},
    ui::{self, key_label, ViewState},
    KeydrillError, SessionEngine,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin, Write},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

const TICK_RATE_MS: u64 = 250;

/// typing practice with live metrics, session history, and weak-key drills
#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// history database to use instead of the default location
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// log level (error, warn, info, debug, trace)
    #[clap(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// type a drill, a custom prompt, or the contents of a file (default)
    Practice {
        /// custom prompt to use
        #[clap(short = 'p', long)]
        prompt: Option<String>,

        /// read the prompt from a file
        #[clap(short = 'f', long, conflicts_with = "prompt")]
        file: Option<PathBuf>,

        /// number of words in generated drills
        #[clap(short = 'w', long)]
        words: Option<usize>,
    },
    #[clap(flatten)]
    Manage(ManageCommand),
}

/// Subcommands that run without the TUI
#[derive(Subcommand, Debug, Clone)]
enum ManageCommand {
    /// list recent sessions
    History {
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// show the characters that need the most practice
    Suggest {
        #[clap(short = 'n', long)]
        count: Option<usize>,
    },
    /// print a drill built from your weak keys
    Drill {
        #[clap(short = 'w', long)]
        words: Option<usize>,

        /// seed for reproducible drills
        #[clap(long)]
        seed: Option<u64>,
    },
    /// write the whole history to stdout or a file
    Export {
        #[clap(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        #[clap(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// load a JSON export back into the history
    Import { file: PathBuf },
    /// delete all recorded sessions
    Clear,
    /// print the effective configuration
    Config {
        /// also write it to the config file
        #[clap(long)]
        write: bool,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
enum ExportFormat {
    Json,
    Csv,
}

type Engine = SessionEngine<Box<dyn HistoryStore>, ViewState>;

/// Open the configured database, or fall back to a throwaway in-memory
/// history when it can't be used
fn open_history(db: Option<PathBuf>, max_records: usize) -> Box<dyn HistoryStore> {
    let path = db
        .or_else(AppDirs::db_path)
        .unwrap_or_else(|| PathBuf::from("keydrill_history.db"));

    match SqliteHistory::open(&path) {
        Ok(store) => Box::new(store.with_max_records(max_records)),
        Err(e) => {
            warn!(path = %path.display(), "history unavailable, using memory: {e}");
            Box::new(MemoryHistory::with_max_records(max_records))
        }
    }
}

fn current_suggestions(history: &dyn HistoryStore, current: &ErrorMap, cfg: &Config) -> Vec<Suggestion> {
    rank(
        &history.list(cfg.history_lookback),
        current,
        cfg.suggestion_count,
    )
}

/// Where the practice text comes from
#[derive(Debug, Clone)]
enum TextSource {
    Fixed(String),
    Drill(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExitType {
    Restart,
    New,
    Quit,
}

struct App {
    engine: Engine,
    config: Config,
    source: TextSource,
    generator: DrillGenerator,
}

impl App {
    fn new(history: Box<dyn HistoryStore>, config: Config, source: TextSource) -> Self {
        Self {
            engine: SessionEngine::new(history, ViewState::default()),
            config,
            source,
            generator: DrillGenerator::builtin(),
        }
    }

    /// Live errors only count while a session is running; a finished one is
    /// already part of the history
    fn suggestions(&self) -> Vec<Suggestion> {
        let live = if self.engine.is_finished() {
            ErrorMap::new()
        } else {
            self.engine.error_map().clone()
        };
        current_suggestions(&**self.engine.history(), &live, &self.config)
    }

    fn next_text(&self) -> String {
        match &self.source {
            TextSource::Fixed(text) => text.clone(),
            TextSource::Drill(words) => {
                let suggestions = self.suggestions();
                self.generator
                    .generate(&suggestions, *words, &mut rand::thread_rng())
            }
        }
    }

    fn start(&mut self, text: &str) {
        self.engine.observer_mut().reset();
        self.engine.load(text);
    }

    fn restart(&mut self) {
        let text: String = self.engine.text().iter().collect();
        self.start(&text);
    }

    fn new_text(&mut self) {
        let text = self.next_text();
        self.start(&text);
    }

    fn on_typing_key(&mut self, key: KeyEvent) -> Option<ExitType> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Some(ExitType::Quit),
            KeyCode::Char('c') if ctrl => return Some(ExitType::Quit),
            KeyCode::Char('r') if ctrl => return Some(ExitType::Restart),
            KeyCode::Char('n') if ctrl => return Some(ExitType::New),
            _ => {}
        }

        if let Some(k) = logical_key(&key) {
            self.engine.handle_keystroke(k);
            if self.engine.observer().is_complete() {
                let suggestions = self.suggestions();
                self.engine.observer_mut().suggestions = suggestions;
            }
        }
        None
    }

    fn on_results_key(&self, key: KeyEvent) -> Option<ExitType> {
        match key.code {
            KeyCode::Char('r') => Some(ExitType::Restart),
            KeyCode::Char('n') => Some(ExitType::New),
            KeyCode::Esc | KeyCode::Char('q') => Some(ExitType::Quit),
            _ => None,
        }
    }

    fn on_tick(&mut self) {
        if self.engine.keystrokes() > 0 && !self.engine.is_finished() {
            let stats = self.engine.stats();
            self.engine.observer_mut().stats = Some(stats);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut config = config_store.load();
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    let command = cli.command.clone().unwrap_or(Command::Practice {
        prompt: None,
        file: None,
        words: None,
    });

    match command {
        Command::Practice {
            prompt,
            file,
            words,
        } => practice(&cli, config, prompt, file, words),
        Command::Manage(command) => run_command(&cli, config, &config_store, command),
    }
}

/// Non-interactive subcommands
fn run_command(
    cli: &Cli,
    config: Config,
    config_store: &FileConfigStore,
    command: ManageCommand,
) -> Result<(), Box<dyn Error>> {
    logging::init_stderr(&config.log_level)?;
    let mut store = open_history(cli.db.clone(), config.max_records);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        ManageCommand::History { limit } => {
            for record in store.list(limit) {
                writeln!(
                    out,
                    "{}  {:>4} wpm  {:>5.1}% acc  {:>3} errors  {:>4} chars",
                    record.completed_at().format("%Y-%m-%d %H:%M"),
                    record.wpm(),
                    record.accuracy(),
                    record.errors(),
                    record.length()
                )?;
            }
        }
        ManageCommand::Suggest { count } => {
            let mut cfg = config.clone();
            if let Some(count) = count {
                cfg.suggestion_count = count;
            }
            for s in current_suggestions(&*store, &ErrorMap::new(), &cfg) {
                writeln!(out, "{:<6} {:.1}", key_label(s.character), s.score)?;
            }
        }
        ManageCommand::Drill { words, seed } => {
            let suggestions = current_suggestions(&*store, &ErrorMap::new(), &config);
            let words = words.unwrap_or(config.drill_words);
            let generator = DrillGenerator::builtin();
            let text = match seed {
                Some(seed) => {
                    use rand::SeedableRng;
                    generator.generate(&suggestions, words, &mut rand::rngs::StdRng::seed_from_u64(seed))
                }
                None => generator.generate(&suggestions, words, &mut rand::thread_rng()),
            };
            writeln!(out, "{text}")?;
        }
        ManageCommand::Export { format, output } => {
            let mut sink: Box<dyn Write> = match output {
                Some(path) => Box::new(fs::File::create(path)?),
                None => Box::new(out),
            };
            match format {
                ExportFormat::Json => writeln!(sink, "{}", store.export_all())?,
                ExportFormat::Csv => history::export_csv(&store.list(usize::MAX), &mut sink)?,
            }
            info!(%format, "history exported");
        }
        ManageCommand::Import { file } => {
            let data = fs::read_to_string(file)?;
            let count = store.import_all(&data)?;
            writeln!(out, "imported {count} sessions")?;
        }
        ManageCommand::Clear => {
            store.clear();
            writeln!(out, "history cleared")?;
        }
        ManageCommand::Config { write } => {
            writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
            if write {
                config_store.save(&config)?;
                info!(path = %config_store.path().display(), "config written");
            }
        }
    }

    Ok(())
}

/// Pick the practice text; empty prompts and files are rejected up front
fn text_source(
    prompt: Option<String>,
    file: Option<PathBuf>,
    drill_words: usize,
) -> keydrill::Result<TextSource> {
    match (prompt, file) {
        (Some(prompt), _) => {
            if prompt.is_empty() {
                return Err(KeydrillError::Text("prompt is empty".to_string()));
            }
            Ok(TextSource::Fixed(prompt))
        }
        (None, Some(path)) => {
            let text = fs::read_to_string(&path)?;
            let text = text.trim_end().to_string();
            if text.is_empty() {
                return Err(KeydrillError::Text(format!("{} is empty", path.display())));
            }
            Ok(TextSource::Fixed(text))
        }
        (None, None) => Ok(TextSource::Drill(drill_words)),
    }
}

fn practice(
    cli: &Cli,
    config: Config,
    prompt: Option<String>,
    file: Option<PathBuf>,
    words: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    let source = text_source(prompt, file, words.unwrap_or(config.drill_words))?;

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        logging::init(&config.log_level, &log_path)?;
    }

    let history = open_history(cli.db.clone(), config.max_records);
    let mut app = App::new(history, config, source);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    app.new_text();

    loop {
        terminal.draw(|f| ui::draw(f, app.engine.observer(), app.engine.text()))?;

        let exit = match runner.step() {
            AppEvent::Tick => {
                app.on_tick();
                None
            }
            AppEvent::Resize => None,
            AppEvent::Key(key) => {
                if app.engine.observer().is_complete() {
                    app.on_results_key(key)
                } else {
                    app.on_typing_key(key)
                }
            }
        };

        match exit {
            Some(ExitType::Restart) => app.restart(),
            Some(ExitType::New) => app.new_text(),
            Some(ExitType::Quit) => break,
            None => {}
        }
    }

    Ok(())
}
