//! storyroll - record short music stories in the terminal.
//!
//! Plays a SoundFont instrument from the computer keyboard (or records the
//! microphone), captures the notes alongside the audio, and draws them live
//! on a linear, waterfall, or radial timeline. Confirmed takes are written
//! as a WAV plus a manifest carrying the MIDI.
//!
//! # Usage
//!
//! ```bash
//! storyroll                                  # record with defaults
//! storyroll record -sf piano.sf2 --style radial
//! storyroll view stories/<id>.json           # replay a saved story
//! storyroll view song.mid -sf piano.sf2      # render and view a MIDI file
//! ```
//!
//! Press `?` for help with keyboard shortcuts.

use anyhow::{bail, Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use storyroll::app::{App, LoadedStory};
use storyroll::audio::{
    read_wav, render_payload, AudioBuffer, AudioEngine, Microphone, PreviewPlayer, SilentPreview,
    SinkPreview,
};
use storyroll::config::{StoryConfig, CONFIG_FILE};
use storyroll::midi::{import_from_midi, MidiCapture, MidiPayload};
use storyroll::render::{ColorMode, RadialStyle, RendererKind};
use storyroll::session::{
    BundleFormat, BundleWriter, RecordingSession, RecordingSource, StoryManifest, StoryMetadata,
};
use storyroll::ui;

/// What to run.
enum Command {
    Record,
    View(PathBuf),
}

/// Command-line options for the application.
struct CliOptions {
    command: Command,
    soundfont: Option<PathBuf>,
    out: Option<PathBuf>,
    style: Option<RendererKind>,
    color: Option<ColorMode>,
    radial: Option<RadialStyle>,
    config: PathBuf,
    log: Option<PathBuf>,
    audio: Option<PathBuf>,
    metadata: StoryMetadata,
    binary: bool,
}

fn print_help(program: &str) {
    eprintln!("storyroll - record short music stories in the terminal");
    eprintln!();
    eprintln!("Usage: {} [record] [OPTIONS]", program);
    eprintln!("       {} view <FILE> [OPTIONS]", program);
    eprintln!();
    eprintln!("FILE is a story manifest (.json / .story), a payload .json, or a .mid file.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -sf, --soundfont PATH  SoundFont for the instrument (.sf2)");
    eprintln!("  -o, --out DIR          Where confirmed stories are written");
    eprintln!("  --style STYLE          linear, waterfall, or radial");
    eprintln!("  --color MODE           flat, velocity, or channel");
    eprintln!("  --radial STYLE         dots, arcs, or particles");
    eprintln!("  -c, --config FILE      Settings file (default: {})", CONFIG_FILE);
    eprintln!("  --log FILE             Write logs to FILE instead of stderr");
    eprintln!("  --audio FILE           WAV to play in view mode");
    eprintln!("  --bpm N                Tempo to tag takes with");
    eprintln!("  --key KEY              Musical key to tag takes with");
    eprintln!("  --genre NAME           Genre tag (repeatable)");
    eprintln!("  --binary               Write .story (binary) manifests");
    eprintln!("  -h, --help             Print this help message");
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Exits the process on `--help` or on malformed arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args
            .first()
            .cloned()
            .unwrap_or_else(|| "storyroll".to_string());

        let mut options = CliOptions {
            command: Command::Record,
            soundfont: None,
            out: None,
            style: None,
            color: None,
            radial: None,
            config: PathBuf::from(CONFIG_FILE),
            log: None,
            audio: None,
            metadata: StoryMetadata::default(),
            binary: false,
        };

        let mut i = 1;
        let value = |i: &mut usize, flag: &str| -> String {
            *i += 1;
            match args.get(*i) {
                Some(v) => v.clone(),
                None => {
                    eprintln!("Error: {} requires an argument", flag);
                    std::process::exit(1);
                }
            }
        };

        while i < args.len() {
            let arg = args[i].clone();
            match arg.as_str() {
                "record" if i == 1 => options.command = Command::Record,
                "view" if i == 1 => {
                    options.command = Command::View(PathBuf::from(value(&mut i, "view")));
                }
                "--soundfont" | "-sf" => {
                    options.soundfont = Some(PathBuf::from(value(&mut i, &arg)));
                }
                "--out" | "-o" => options.out = Some(PathBuf::from(value(&mut i, &arg))),
                "--style" => {
                    let name = value(&mut i, &arg);
                    options.style = Some(
                        RendererKind::from_name(&name)
                            .with_context(|| format!("Unknown style: {}", name))?,
                    );
                }
                "--color" => {
                    let name = value(&mut i, &arg);
                    options.color = Some(
                        ColorMode::from_name(&name)
                            .with_context(|| format!("Unknown color mode: {}", name))?,
                    );
                }
                "--radial" => {
                    let name = value(&mut i, &arg);
                    options.radial = Some(
                        RadialStyle::from_name(&name)
                            .with_context(|| format!("Unknown radial style: {}", name))?,
                    );
                }
                "--config" | "-c" => options.config = PathBuf::from(value(&mut i, &arg)),
                "--log" => options.log = Some(PathBuf::from(value(&mut i, &arg))),
                "--audio" => options.audio = Some(PathBuf::from(value(&mut i, &arg))),
                "--bpm" => {
                    let text = value(&mut i, &arg);
                    let bpm: u32 = text
                        .parse()
                        .with_context(|| format!("Invalid BPM: {}", text))?;
                    options.metadata.bpm = Some(bpm).filter(|b| *b > 0);
                }
                "--key" => options.metadata.key = Some(value(&mut i, &arg)),
                "--genre" => options.metadata.genres.push(value(&mut i, &arg)),
                "--binary" => options.binary = true,
                "--help" | "-h" => {
                    print_help(&program);
                    std::process::exit(0);
                }
                other => {
                    if other.ends_with(".sf2") {
                        options.soundfont = Some(PathBuf::from(other));
                    } else {
                        eprintln!("Unknown option: {}", other);
                        eprintln!("Use --help for usage information");
                        std::process::exit(1);
                    }
                }
            }
            i += 1;
        }

        Ok(options)
    }

    /// Applies command-line overrides on top of the loaded settings.
    fn apply(&self, config: &mut StoryConfig) {
        if let Some(style) = self.style {
            config.renderer = style;
        }
        if let Some(color) = self.color {
            config.color_mode = color;
        }
        if let Some(radial) = self.radial {
            config.radial_style = radial;
        }
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
        if let Some(soundfont) = &self.soundfont {
            config.soundfont = Some(soundfont.clone());
        }
    }
}

/// Sends logs to `path`, or to stderr when no path is given.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// The SoundFont from settings, if it exists on disk.
fn existing_soundfont(config: &StoryConfig) -> Option<PathBuf> {
    let path = config.soundfont.clone()?;
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Warning: SoundFont not found: {}", path.display());
        None
    }
}

/// Opens the default output for previews, falling back to a silent clock.
fn open_preview(engine: Option<&AudioEngine>, duration: f64) -> Box<dyn PreviewPlayer> {
    if let Some(engine) = engine {
        return Box::new(SinkPreview::with_handle(engine.output_handle()));
    }
    match SinkPreview::open_default() {
        Ok(preview) => Box::new(preview),
        Err(e) => {
            tracing::warn!("Preview will be silent: {}", e);
            Box::new(SilentPreview::with_duration(duration))
        }
    }
}

/// Builds a record-mode app from whatever inputs are available.
fn build_record_app(cli: &CliOptions, config: StoryConfig) -> Result<App> {
    let capture = MidiCapture::new();
    if let Some(bpm) = cli.metadata.bpm {
        capture.set_tempo(bpm as f64);
    }

    let engine = match existing_soundfont(&config) {
        Some(path) => match AudioEngine::new(&path, capture.clone()) {
            Ok(engine) => Some(engine),
            Err(e) => {
                eprintln!("Warning: instrument unavailable: {:#}", e);
                None
            }
        },
        None => None,
    };
    if let (Some(engine), Some(bpm)) = (engine.as_ref(), cli.metadata.bpm) {
        engine.set_bpm(bpm as f64);
    }

    let microphone = match Microphone::open_default() {
        Ok(mic) => Some(mic),
        Err(e) => {
            tracing::warn!("Microphone unavailable: {:#}", e);
            None
        }
    };

    if engine.is_none() && microphone.is_none() {
        bail!("Nothing to record from: pass a SoundFont with --soundfont or connect a microphone");
    }

    let preview = open_preview(engine.as_ref(), 0.0);
    let mut session = RecordingSession::new(capture, preview).with_config(&config);
    if let Some(engine) = engine.as_ref() {
        session = session.with_source(
            RecordingSource::Instrument,
            Box::new(engine.capture_source()),
        );
    }
    if let Some(mic) = microphone {
        session = session.with_source(RecordingSource::Microphone, Box::new(mic));
    }
    session.set_on_discard(|| tracing::debug!("Take discarded by user"));

    let format = if cli.binary {
        BundleFormat::Binary
    } else {
        BundleFormat::Json
    };
    let writer = BundleWriter::new(config.output_dir.clone()).with_format(format);

    Ok(App::record(
        config,
        session,
        engine,
        writer,
        cli.metadata.clone(),
    ))
}

/// Reads a story manifest, a bare payload JSON, or a Standard MIDI File.
fn load_story_file(path: &Path) -> Result<(MidiPayload, Option<StoryManifest>)> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mid" | "midi" => {
            let payload = import_from_midi(path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            Ok((payload, None))
        }
        "story" => {
            let manifest = StoryManifest::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok((manifest.midi.clone(), Some(manifest)))
        }
        _ => match StoryManifest::read(path) {
            Ok(manifest) => Ok((manifest.midi.clone(), Some(manifest))),
            Err(e) => {
                tracing::info!("{} is not a manifest ({}); reading as payload", path.display(), e);
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok((MidiPayload::from_json_str(&json), None))
            }
        },
    }
}

/// Builds a view-mode app for `path`.
fn build_view_app(cli: &CliOptions, config: StoryConfig, path: &Path) -> Result<App> {
    let (payload, manifest) = load_story_file(path)?;

    let wav_path = cli
        .audio
        .clone()
        .or_else(|| manifest.as_ref().and_then(|m| m.audio_path(path)));
    let audio = match wav_path {
        Some(wav) => read_wav(&wav).with_context(|| format!("Failed to read {}", wav.display()))?,
        None => match existing_soundfont(&config).filter(|_| !payload.is_empty()) {
            Some(soundfont) => render_payload(&payload, &soundfont)?,
            None => AudioBuffer::default(),
        },
    };

    let (notes, duration, metadata) = match &manifest {
        Some(m) => {
            let notes = if m.notes.is_empty() {
                payload.compile()
            } else {
                m.notes.clone()
            };
            let metadata = StoryMetadata {
                bpm: m.bpm,
                key: m.key.clone(),
                genres: m.genres.clone(),
            };
            (notes, m.duration_seconds.max(payload.total_time), metadata)
        }
        None => (payload.compile(), payload.total_time, cli.metadata.clone()),
    };

    let preview = if audio.is_empty() {
        Box::new(SilentPreview::with_duration(duration)) as Box<dyn PreviewPlayer>
    } else {
        open_preview(None, duration)
    };
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let story = LoadedStory::new(title, notes, duration, audio, preview).with_metadata(metadata);
    Ok(App::view(config, story))
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;
    init_logging(cli.log.as_deref())?;

    let mut config = StoryConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate().context("Invalid settings")?;

    let mut app = match &cli.command {
        Command::Record => build_record_app(&cli, config)?,
        Command::View(path) => build_view_app(&cli, config, path)?,
    };

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result?;

    for path in &app.saved {
        println!("{}", path.display());
    }
    Ok(())
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick = Duration::from_secs_f64(app.config.tick_interval_secs());
    let mut next_tick = Instant::now();

    loop {
        if Instant::now() >= next_tick {
            app.tick();
            next_tick += tick;
        }

        terminal.draw(|frame| ui::render(frame, app))?;

        let timeout = next_tick.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.show_help {
                        handle_help_key(app, key.code);
                        continue;
                    }
                    if handle_key(app, key)? {
                        break;
                    }
                }
                Event::Key(key) if key.kind == KeyEventKind::Release => {
                    if let KeyCode::Char(c) = key.code {
                        app.handle_note_key_release(c);
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                _ => {}
            }
        }
    }

    app.release_all_notes();
    Ok(())
}

/// Keys while the help overlay is visible: close and scroll.
fn handle_help_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('?') | KeyCode::Esc => {
            app.show_help = false;
            app.help_scroll = 0;
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.help_scroll = app.help_scroll.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.help_scroll = app.help_scroll.saturating_add(1);
        }
        KeyCode::PageUp => {
            app.help_scroll = app.help_scroll.saturating_sub(10);
        }
        KeyCode::PageDown => {
            app.help_scroll = app.help_scroll.saturating_add(10);
        }
        KeyCode::Home => {
            app.help_scroll = 0;
        }
        _ => {}
    }
}

/// Handles mouse events.
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.show_help {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                app.show_help = false;
                app.help_scroll = 0;
            }
            MouseEventKind::ScrollUp => {
                app.help_scroll = app.help_scroll.saturating_sub(3);
            }
            MouseEventKind::ScrollDown => {
                app.help_scroll = app.help_scroll.saturating_add(3);
            }
            _ => {}
        }
        return;
    }

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.handle_canvas_click(mouse.column, mouse.row);
        }
        MouseEventKind::ScrollUp => app.zoom(1.25),
        MouseEventKind::ScrollDown => app.zoom(0.8),
        MouseEventKind::ScrollLeft => app.scroll(-1.0),
        MouseEventKind::ScrollRight => app.scroll(1.0),
        _ => {}
    }
}

/// Handles a key press event.
///
/// # Returns
///
/// `true` if the application should quit
fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let recording_mode = app.session.is_some();

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => return Ok(true),
        KeyCode::Esc => return Ok(true),
        KeyCode::Char('q') if !recording_mode => return Ok(true),
        KeyCode::Char('r') if ctrl => app.toggle_recording(),
        KeyCode::Char('t') if ctrl => app.toggle_source(),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Enter => app.primary_action(),
        KeyCode::Backspace | KeyCode::Delete => app.discard(),
        KeyCode::Char(' ') => app.toggle_preview(),
        KeyCode::Tab => app.cycle_renderer(),
        KeyCode::Left => app.seek((app.position_seconds() - 1.0).max(0.0)),
        KeyCode::Right => {
            let end = app.timeline.total_duration();
            app.seek((app.position_seconds() + 1.0).min(end));
        }
        KeyCode::Home => app.seek(0.0),
        KeyCode::Char(c) if !ctrl => {
            if !app.handle_note_key(c) {
                handle_char(app, c);
            }
        }
        _ => {}
    }
    Ok(false)
}

/// Single-character bindings that are not notes.
fn handle_char(app: &mut App, c: char) {
    match c {
        'o' => app.cycle_color_mode(),
        'p' => app.cycle_radial_style(),
        '=' | '+' => app.zoom(1.25),
        '-' | '_' => app.zoom(0.8),
        '[' => app.scroll(-1.0),
        ']' => app.scroll(1.0),
        ',' => app.octave_down(),
        '/' => app.octave_up(),
        '<' => app.change_program(-1),
        '>' => app.change_program(1),
        '9' => app.adjust_bpm(-1),
        '0' => app.adjust_bpm(1),
        'k' => app.cycle_key(),
        _ => {}
    }
}
