use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use readalong::{
    api::{FeedbackApi, HttpFeedbackApi},
    app::{App, Services},
    app_dirs::AppDirs,
    capture::{
        recognizer::ScriptedRecognizer, recorder::CpalRecorder, CaptureController,
        SpeechRecognizer,
    },
    config::{Config, ConfigStore, FileConfigStore},
    context::{assignment_id_from_url, PracticeContext},
    library::Library,
    logging::init_file_logger,
    passage::Passage,
    pipeline::TranscribeFailurePolicy,
    playback::{PlaybackTrigger, RodioSink},
    runtime::{spawn_terminal_input, ChannelEventSource, EventSource, FixedTicker, Runner, Ticker},
};

const TICK_RATE_MS: u64 = 100;
const RECOGNIZER_INTERVAL_MS: u64 = 1200;

/// read-aloud practice with live word highlighting and coaching feedback
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Read a passage aloud while the words you have read light up, then get an accuracy score, per-word feedback, tips, and comprehension questions from the reading server."
)]
pub struct Cli {
    /// passage text to read
    #[clap(short = 'p', long, conflicts_with = "passage_file")]
    passage: Option<String>,

    /// read the passage from a file
    #[clap(short = 'f', long)]
    passage_file: Option<PathBuf>,

    /// base url of the reading server
    #[clap(long)]
    server: Option<String>,

    /// assignment this reading belongs to; enables saving results
    #[clap(short = 'a', long)]
    assignment_id: Option<i64>,

    /// page url whose `id` query parameter names the assignment
    #[clap(long)]
    page_url: Option<String>,

    /// what to do when transcription fails: continue or abort
    #[clap(long)]
    on_transcribe_failure: Option<TranscribeFailurePolicy>,

    /// give up on a server request after this many seconds
    #[clap(long)]
    request_timeout_secs: Option<u64>,

    /// replay recognizer results from a file, one phrase per line
    #[clap(long)]
    recognizer_script: Option<PathBuf>,

    /// record without live highlighting
    #[clap(long)]
    no_recognizer: bool,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Command line flags take precedence over stored settings.
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(policy) = self.on_transcribe_failure {
            config.transcribe_failure = policy;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = Some(secs);
        }
        config
    }

    fn assignment_id(&self) -> Option<i64> {
        self.assignment_id
            .or_else(|| self.page_url.as_deref().and_then(assignment_id_from_url))
    }

    /// Passage text and title: explicit text, then a file, then a bundled pick.
    fn resolve_passage(&self, library: &Library) -> io::Result<(String, Option<String>)> {
        if let Some(text) = &self.passage {
            return Ok((text.trim().to_string(), None));
        }
        if let Some(path) = &self.passage_file {
            let text = fs::read_to_string(path)?;
            let title = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            return Ok((text.trim().to_string(), title));
        }
        Ok(library
            .random()
            .map(|e| (e.text.clone(), Some(e.title.clone())))
            .unwrap_or_default())
    }

    fn recognizer(&self) -> io::Result<Option<Box<dyn SpeechRecognizer>>> {
        if self.no_recognizer {
            return Ok(None);
        }
        match &self.recognizer_script {
            Some(path) => {
                let recognizer = ScriptedRecognizer::from_file(
                    path,
                    Duration::from_millis(RECOGNIZER_INTERVAL_MS),
                )?;
                Ok(Some(Box::new(recognizer)))
            }
            None => {
                info!("no speech recognizer available, recording only");
                Ok(None)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        if let Err(e) = init_file_logger(&path) {
            eprintln!("logging disabled: {}", e);
        }
    }

    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());
    if cli.save_config {
        if let Err(e) = store.save(&config) {
            warn!("could not save config to {}: {}", store.path().display(), e);
        }
    }
    info!("using reading server {}", config.server_url);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let api: Arc<dyn FeedbackApi> = Arc::new(HttpFeedbackApi::new(
        &config.server_url,
        config.request_timeout(),
    )?);
    let services = Services {
        api: Arc::clone(&api),
        playback: PlaybackTrigger::new(api, Arc::new(RodioSink::new(config.playback_volume))),
        policy: config.transcribe_failure,
        runtime: runtime.handle().clone(),
    };

    let library = Library::bundled();
    let (text, title) = cli.resolve_passage(&library)?;
    let context = PracticeContext::new(text.clone())
        .with_assignment(cli.assignment_id())
        .with_title(title);

    let controller = CaptureController::new(
        Passage::new(text),
        Box::new(CpalRecorder::new()),
        cli.recognizer()?,
        config.recognition_options(),
    );

    let (source, sender) = ChannelEventSource::new();
    spawn_terminal_input(sender.clone());
    let mut app = App::new(controller, context, library, services, sender);
    let runner = Runner::new(source, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    let mut redraw = true;
    while !app.should_quit() {
        if redraw {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
        redraw = app.handle_event(runner.step());
    }
    Ok(())
}
