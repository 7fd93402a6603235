//! Rollcall TUI - desktop variant of the attendance counter
//!
//! Terminal dashboard around the same session core as the web variant:
//! - roster table (name, count, first/last seen)
//! - phase and status line
//! - text input for the API key and for screenshot paths
//!
//! Keys: Enter submits the typed path (or stores the API key in key-entry
//! mode), Ctrl-E exports, Ctrl-R resets, Ctrl-K re-enters key mode, Esc
//! quits.

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame, Terminal,
};
use rollcall::domain::roster::format_ts;
use rollcall::domain::types::SessionPhase;
use rollcall::infra::{Config, Stats};
use rollcall::io::extractor::VisionExtractor;
use rollcall::services::session::{RosterSnapshot, Session};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Rollcall TUI - participant-panel attendance counter
#[derive(Parser, Debug)]
#[command(name = "rollcall-tui", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

/// What the input line currently means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Credential,
    ImagePath,
}

/// UI state shared between the event loop and the submission task
struct App {
    input: String,
    mode: InputMode,
    status: String,
    status_is_error: bool,
    busy: bool,
    snapshot: RosterSnapshot,
}

impl App {
    fn new(credential_set: bool, snapshot: RosterSnapshot) -> Self {
        let (mode, status) = if credential_set {
            (InputMode::ImagePath, "Type a screenshot path and press Enter".to_string())
        } else {
            (InputMode::Credential, "Enter your API key and press Enter".to_string())
        };
        Self { input: String::new(), mode, status, status_is_error: false, busy: false, snapshot }
    }

    fn set_status(&mut self, message: String, is_error: bool) {
        self.status = message;
        self.status_is_error = is_error;
    }
}

type SharedApp = Arc<Mutex<App>>;
type SharedSession = Arc<Mutex<Session<VisionExtractor>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    let stats = Arc::new(Stats::new());
    let extractor = VisionExtractor::new(&config)?;
    let mut session = Session::new(&config, extractor, stats);
    if let Ok(key) = std::env::var("ROLLCALL_API_KEY") {
        if !key.trim().is_empty() {
            session.set_credential(key);
        }
    }

    let credential_set = session.credential_set();
    let snapshot = session.snapshot();
    let session: SharedSession = Arc::new(Mutex::new(session));
    let app: SharedApp = Arc::new(Mutex::new(App::new(credential_set, snapshot)));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, app, session).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: SharedApp,
    session: SharedSession,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        // Refresh the snapshot when the session is not mid-submission
        if let Ok(s) = session.try_lock() {
            app.lock().await.snapshot = s.snapshot();
        }

        let a = app.lock().await;
        terminal.draw(|f| draw_ui(f, &a))?;
        drop(a);

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
                    match key.code {
                        KeyCode::Esc => return Ok(()),
                        KeyCode::Char('c') if ctrl => return Ok(()),
                        KeyCode::Char('e') if ctrl => handle_export(&app, &session).await,
                        KeyCode::Char('r') if ctrl => handle_reset(&app, &session).await,
                        KeyCode::Char('k') if ctrl => {
                            let mut a = app.lock().await;
                            a.mode = InputMode::Credential;
                            a.input.clear();
                            a.set_status("Enter your API key and press Enter".to_string(), false);
                        }
                        KeyCode::Enter => handle_enter(&app, &session).await,
                        KeyCode::Backspace => {
                            app.lock().await.input.pop();
                        }
                        KeyCode::Char(c) if !ctrl => {
                            app.lock().await.input.push(c);
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

async fn handle_enter(app: &SharedApp, session: &SharedSession) {
    let (input, mode, busy) = {
        let a = app.lock().await;
        (a.input.trim().to_string(), a.mode, a.busy)
    };

    if busy {
        app.lock().await.set_status("Submission already in flight".to_string(), true);
        return;
    }
    if input.is_empty() {
        return;
    }

    match mode {
        InputMode::Credential => {
            session.lock().await.set_credential(input);
            let mut a = app.lock().await;
            a.input.clear();
            a.mode = InputMode::ImagePath;
            a.set_status("Key saved. Type a screenshot path and press Enter".to_string(), false);
        }
        InputMode::ImagePath => {
            app.lock().await.input.clear();
            spawn_submission(app.clone(), session.clone(), input);
        }
    }
}

/// Run one submission off the UI loop; the session lock is held for its
/// duration, so the roster table freezes on the pre-submission state until
/// the result lands.
fn spawn_submission(app: SharedApp, session: SharedSession, path: String) {
    tokio::spawn(async move {
        {
            let mut a = app.lock().await;
            a.busy = true;
            a.set_status(format!("Submitting {path}..."), false);
        }

        let outcome = match tokio::fs::read(&path).await {
            Ok(image) => session.lock().await.submit(&image).await.map_err(|e| e.to_string()),
            Err(e) => Err(format!("failed to read {path}: {e}")),
        };

        let mut a = app.lock().await;
        a.busy = false;
        match outcome {
            Ok(summary) if summary.no_names_found => {
                a.set_status("No names found in this screenshot".to_string(), false);
            }
            Ok(summary) => {
                a.set_status(
                    format!("Detected {} (new: {})", summary.names_seen, summary.new_names),
                    false,
                );
            }
            Err(message) => a.set_status(message, true),
        }
    });
}

async fn handle_export(app: &SharedApp, session: &SharedSession) {
    let Ok(mut s) = session.try_lock() else {
        app.lock().await.set_status("Submission in flight, try again".to_string(), true);
        return;
    };
    let mut a = app.lock().await;
    match s.export() {
        Ok(path) => a.set_status(format!("Exported to {}", path.display()), false),
        Err(e) => a.set_status(e.to_string(), true),
    }
}

async fn handle_reset(app: &SharedApp, session: &SharedSession) {
    let Ok(mut s) = session.try_lock() else {
        app.lock().await.set_status("Submission in flight, try again".to_string(), true);
        return;
    };
    s.reset();
    app.lock().await.set_status("Roster cleared".to_string(), false);
}

fn draw_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Roster table
            Constraint::Length(3), // Status
            Constraint::Length(3), // Input
        ])
        .split(f.area());

    draw_header(f, chunks[0], app);
    draw_roster(f, chunks[1], app);
    draw_status(f, chunks[2], app);
    draw_input(f, chunks[3], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let snapshot = &app.snapshot;
    let phase = if app.busy { SessionPhase::Submitting } else { snapshot.phase };
    let phase_color = match phase {
        SessionPhase::Error => Color::Red,
        SessionPhase::Submitting | SessionPhase::Normalizing => Color::Yellow,
        _ => Color::Green,
    };
    let key_state = if snapshot.credential_set { "key set" } else { "key required" };

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Rollcall ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("| "),
        Span::styled(phase.as_str(), Style::default().fg(phase_color)),
        Span::raw(" | "),
        Span::raw(key_state),
        Span::raw(" | "),
        Span::styled(
            format!("{} attendees / {} sightings", snapshot.total_attendees, snapshot.total_sightings),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" | ^E export ^R reset ^K key Esc quit"),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_roster(f: &mut Frame, area: Rect, app: &App) {
    let rows: Vec<Row> = app
        .snapshot
        .attendees
        .iter()
        .map(|a| {
            Row::new(vec![
                a.name.clone(),
                a.count.to_string(),
                format_ts(a.first_seen),
                format_ts(a.last_seen),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(20),    // Name
            Constraint::Length(7),  // Count
            Constraint::Length(20), // First seen
            Constraint::Length(20), // Last seen
        ],
    )
    .header(
        Row::new(vec!["Name", "Count", "First seen", "Last seen"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .title(" Attendance ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );

    f.render_widget(table, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let color = if app.status_is_error { Color::Red } else { Color::Gray };
    let status = Paragraph::new(Span::styled(app.status.clone(), Style::default().fg(color)))
        .block(Block::default().title(" Status ").borders(Borders::ALL));
    f.render_widget(status, area);
}

fn draw_input(f: &mut Frame, area: Rect, app: &App) {
    // Key entry is masked; paths render as typed
    let (title, shown) = match app.mode {
        InputMode::Credential => (" API key ", "*".repeat(app.input.chars().count())),
        InputMode::ImagePath => (" Screenshot path ", app.input.clone()),
    };
    let input = Paragraph::new(shown)
        .block(Block::default().title(title).borders(Borders::ALL))
        .style(Style::default().fg(Color::White));
    f.render_widget(input, area);
}
