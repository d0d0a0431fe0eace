use std::fs;
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::style::{Attribute, Color, Colors, Print, ResetColor, SetAttribute, SetColors};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use directories::ProjectDirs;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};
use wordlens_core::{
    import_documents, library_summary, viewer_for, Config, DefinitionLookup, DefinitionResult,
    DocumentId, DocumentRegistry, LookupTicket, PathPicker, ReaderCommand, ReaderEvent,
    ReaderSession, RegistryEvent, TapDetector, ViewerPage,
};
use wordlens_dict::HttpDictionary;
use wordlens_tty::{write_status_line, EventMapper, InputMode, UiEvent, WordCursor};

#[derive(Debug, Parser)]
#[command(
    name = "wordlens",
    version,
    about = "Terminal document reader with one-keystroke dictionary lookup"
)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// PDF or DOCX files to add to the library
    files: Vec<PathBuf>,
}

const PAGE_COLUMN: u16 = 2;
const PAGE_ROW: u16 = 3;
const POPOVER_WIDTH: usize = 44;
const NOT_FOUND_NOTICE: &str = "Document not found";

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(
            stdout,
            DisableMouseCapture,
            LeaveAlternateScreen,
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "wordlens", "wordlens")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs, &args.log_level)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_path(&project_dirs));
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load configuration from {:?}", config_path))?;
    info!(path = ?config_path, "configuration loaded");

    let mut registry = DocumentRegistry::new();
    let picker = PathPicker::new(args.files.clone());
    let status = match import_documents(&mut registry, &picker).await {
        Ok(summary) => summary.message(),
        Err(err) => {
            warn!(%err, "import failed");
            Some(err.to_string())
        }
    };

    let dictionary = HttpDictionary::new(&config.dictionary)?;
    info!(endpoint = %dictionary.endpoint(), "dictionary client ready");
    let (tx, rx) = mpsc::unbounded_channel();
    let runner = LookupRunner {
        lookup: Arc::new(DefinitionLookup::new(dictionary)),
        tx,
    };

    let mut app = App::new(registry, runner, config.gestures.triple_tap_window);
    app.status = status;

    let _terminal = TerminalGuard::new()?;
    run(&mut app, rx)
}

fn run(
    app: &mut App,
    mut results: UnboundedReceiver<(LookupTicket, DefinitionResult)>,
) -> Result<()> {
    let mut stdout = io::stdout();
    let mut mapper = EventMapper::new();
    let mut dirty = true;

    loop {
        while let Ok((ticket, result)) = results.try_recv() {
            dirty |= app.deliver_result(ticket, result);
        }
        dirty |= app.drain_events();
        if let Screen::Reader(view) = &mut app.screen {
            let before = view.session.pending_taps();
            view.session.tick(Instant::now());
            dirty |= before != view.session.pending_taps();
        }

        mapper.set_mode(app.input_mode());

        if dirty {
            redraw(&mut stdout, app, mapper.pending_input().as_deref())?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(50))? {
            let ui_event = mapper.map_event(event::read()?);
            match app.handle_event(ui_event) {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
            if mapper.pending_input().is_some() {
                dirty = true;
            }
        }
    }

    crossterm::execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    Ok(())
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

/// Runs lookups off the event loop and posts results back to it.
struct LookupRunner {
    lookup: Arc<DefinitionLookup<HttpDictionary>>,
    tx: UnboundedSender<(LookupTicket, DefinitionResult)>,
}

impl LookupRunner {
    fn spawn(&self, ticket: LookupTicket) {
        let lookup = Arc::clone(&self.lookup);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = lookup.lookup(&ticket.word).await;
            if tx.send((ticket, result)).is_err() {
                warn!("event loop closed before lookup finished");
            }
        });
    }
}

enum Screen {
    Library,
    Reader(ReaderView),
}

struct ReaderView {
    session: ReaderSession,
    events: Arc<Mutex<Vec<ReaderEvent>>>,
    page: ViewerPage,
    cursor: WordCursor,
}

struct App {
    registry: DocumentRegistry,
    registry_events: Arc<Mutex<Vec<RegistryEvent>>>,
    runner: LookupRunner,
    tap_window: Duration,
    screen: Screen,
    selected: usize,
    pending_removal: Option<DocumentId>,
    dark_mode: bool,
    status: Option<String>,
}

impl App {
    fn new(registry: DocumentRegistry, runner: LookupRunner, tap_window: Duration) -> Self {
        let registry_events = registry.events();
        Self {
            registry,
            registry_events,
            runner,
            tap_window,
            screen: Screen::Library,
            selected: 0,
            pending_removal: None,
            dark_mode: false,
            status: None,
        }
    }

    fn input_mode(&self) -> InputMode {
        match &self.screen {
            Screen::Library if self.pending_removal.is_some() => InputMode::ConfirmRemove,
            Screen::Library => InputMode::Library,
            Screen::Reader(view) if view.session.selection().is_some() => InputMode::Lookup,
            Screen::Reader(_) => InputMode::Reader,
        }
    }

    /// Empties both change queues; true when anything changed.
    fn drain_events(&mut self) -> bool {
        let mut changed = !std::mem::take(&mut *self.registry_events.lock()).is_empty();
        if let Screen::Reader(view) = &self.screen {
            for event in std::mem::take(&mut *view.events.lock()) {
                if let ReaderEvent::ThemeChanged { dark_mode } = event {
                    self.dark_mode = dark_mode;
                }
                changed = true;
            }
        }
        changed
    }

    /// Hands a finished lookup to the open reader. Results that arrive
    /// after the reader closed are dropped.
    fn deliver_result(&mut self, ticket: LookupTicket, result: DefinitionResult) -> bool {
        match &mut self.screen {
            Screen::Reader(view) => view.session.resolve(&ticket, result),
            Screen::Library => false,
        }
    }

    fn handle_event(&mut self, event: UiEvent) -> LoopAction {
        match event {
            UiEvent::Quit => LoopAction::Quit,
            UiEvent::None => LoopAction::Continue,
            UiEvent::LibraryMove { delta } => {
                let len = self.registry.len();
                if len == 0 {
                    return LoopAction::Continue;
                }
                let next = (self.selected as isize + delta).clamp(0, len as isize - 1) as usize;
                if next == self.selected {
                    return LoopAction::Continue;
                }
                self.selected = next;
                LoopAction::ContinueRedraw
            }
            UiEvent::OpenDocument => {
                if let Some(doc) = self.registry.list().get(self.selected) {
                    self.open_reader(doc.id);
                }
                LoopAction::ContinueRedraw
            }
            UiEvent::RequestRemove => {
                if let Some(doc) = self.registry.list().get(self.selected) {
                    self.status = Some(format!(
                        "Remove \"{}\" from your library? (y/n)",
                        doc.name
                    ));
                    self.pending_removal = Some(doc.id);
                }
                LoopAction::ContinueRedraw
            }
            UiEvent::ConfirmRemove => {
                if let Some(id) = self.pending_removal.take() {
                    self.registry.remove(id);
                    self.selected = self.selected.min(self.registry.len().saturating_sub(1));
                    self.status = Some("Document removed".to_string());
                }
                LoopAction::ContinueRedraw
            }
            UiEvent::CancelRemove => {
                self.pending_removal = None;
                self.status = None;
                LoopAction::ContinueRedraw
            }
            UiEvent::Back => {
                self.screen = Screen::Library;
                self.status = None;
                LoopAction::ContinueRedraw
            }
            UiEvent::Command(command) => self.apply_reader_command(command),
            UiEvent::MoveWord { delta } => self.with_cursor(|cursor| cursor.move_words(delta)),
            UiEvent::MoveLine { delta } => self.with_cursor(|cursor| cursor.move_lines(delta)),
            UiEvent::SelectWord => match self.cursor_selection(false) {
                Some((text, bounds)) => {
                    self.apply_reader_command(ReaderCommand::SelectText { text, bounds })
                }
                None => LoopAction::Continue,
            },
            UiEvent::SelectLine => match self.cursor_selection(true) {
                Some((text, bounds)) => {
                    self.apply_reader_command(ReaderCommand::SelectText { text, bounds })
                }
                None => LoopAction::Continue,
            },
        }
    }

    fn open_reader(&mut self, id: DocumentId) {
        let taps = TapDetector::new(self.tap_window);
        let opened = ReaderSession::open_with(&self.registry, id, taps)
            .and_then(|session| Ok((session.document(&self.registry)?, session)));
        match opened {
            Ok((record, mut session)) => {
                session.set_dark_mode(self.dark_mode);
                let page = viewer_for(record.format).render(&record);
                let cursor = WordCursor::new(&page, PAGE_COLUMN, PAGE_ROW);
                self.status = None;
                self.screen = Screen::Reader(ReaderView {
                    events: session.events(),
                    session,
                    page,
                    cursor,
                });
            }
            Err(err) => {
                warn!(%err, "cannot open reader");
                self.status = Some(NOT_FOUND_NOTICE.to_string());
                self.screen = Screen::Library;
            }
        }
    }

    fn apply_reader_command(&mut self, command: ReaderCommand) -> LoopAction {
        let Screen::Reader(view) = &mut self.screen else {
            return LoopAction::Continue;
        };
        if view.session.document(&self.registry).is_err() {
            self.status = Some(NOT_FOUND_NOTICE.to_string());
            self.screen = Screen::Library;
            return LoopAction::ContinueRedraw;
        }
        if let Some(ticket) = view.session.apply(command) {
            info!(word = %ticket.word, "looking up definition");
            self.runner.spawn(ticket);
        }
        LoopAction::ContinueRedraw
    }

    fn with_cursor(&mut self, f: impl FnOnce(&mut WordCursor)) -> LoopAction {
        match &mut self.screen {
            Screen::Reader(view) => {
                f(&mut view.cursor);
                LoopAction::ContinueRedraw
            }
            Screen::Library => LoopAction::Continue,
        }
    }

    fn cursor_selection(&self, whole_line: bool) -> Option<(String, wordlens_core::Rect)> {
        let Screen::Reader(view) = &self.screen else {
            return None;
        };
        if whole_line {
            view.cursor.selected_line()
        } else {
            view.cursor.selected_word()
        }
    }
}

fn redraw(stdout: &mut Stdout, app: &App, pending_input: Option<&str>) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    let cols = cols.max(1) as usize;
    let rows = rows.max(1);

    if app.dark_mode {
        crossterm::queue!(stdout, SetColors(Colors::new(Color::Grey, Color::Black)))?;
    } else {
        crossterm::queue!(stdout, ResetColor)?;
    }
    crossterm::queue!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;

    let status = match &app.screen {
        Screen::Library => {
            draw_library(stdout, app, cols, rows)?;
            app.status.clone()
        }
        Screen::Reader(view) => {
            draw_reader(stdout, view, cols, rows)?;
            let taps = view.session.pending_taps();
            let tap_hint = (taps > 0).then(|| format!("taps: {taps}"));
            combine_status(app.status.clone(), tap_hint.as_deref())
        }
    };

    if let Some(status) = combine_status(status, pending_input) {
        crossterm::queue!(
            stdout,
            cursor::MoveTo(0, rows.saturating_sub(1)),
            Clear(ClearType::CurrentLine)
        )?;
        write_status_line(stdout, &truncate_with_ellipsis(status, cols))?;
    }
    stdout.flush()?;
    Ok(())
}

fn draw_library(stdout: &mut Stdout, app: &App, cols: usize, rows: u16) -> Result<()> {
    let documents = app.registry.list();
    crossterm::queue!(
        stdout,
        cursor::MoveTo(0, 0),
        SetAttribute(Attribute::Bold),
        Print("Library"),
        SetAttribute(Attribute::NormalIntensity),
        cursor::MoveTo(0, 1),
        Print(library_summary(documents.len()))
    )?;

    if documents.is_empty() {
        crossterm::queue!(
            stdout,
            cursor::MoveTo(2, 3),
            Print("No Documents"),
            cursor::MoveTo(2, 4),
            Print("Pass PDF and DOCX files on the command line to start reading")
        )?;
        return Ok(());
    }

    let visible = rows.saturating_sub(4).max(1) as usize;
    let offset = app.selected.saturating_sub(visible.saturating_sub(1));
    for (row, (idx, doc)) in documents
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible)
        .enumerate()
    {
        let marker = if idx == app.selected { '>' } else { ' ' };
        let line = format!("{marker} {}  ({})", doc.name, doc.details());
        let line = truncate_with_ellipsis(line, cols);
        let row = 3 + row as u16;
        if idx == app.selected {
            print_inverted(stdout, 0, row, &line)?;
        } else {
            crossterm::queue!(stdout, cursor::MoveTo(0, row), Print(line))?;
        }
    }
    Ok(())
}

fn draw_reader(stdout: &mut Stdout, view: &ReaderView, cols: usize, rows: u16) -> Result<()> {
    let title = truncate_with_ellipsis(format!("< {}", view.page.title), cols);
    crossterm::queue!(
        stdout,
        cursor::MoveTo(0, 0),
        SetAttribute(Attribute::Bold),
        Print(title),
        SetAttribute(Attribute::NormalIntensity)
    )?;

    if view.session.overlay_visible() {
        let theme = if view.session.dark_mode() {
            "Light"
        } else {
            "Dark"
        };
        let bar = format!("Reader Options  |  d: {theme}  |  Esc: Done");
        let bar = format!("{:<width$}", bar, width = cols);
        print_inverted(stdout, 0, 1, &truncate_with_ellipsis(bar, cols))?;
    }

    let last_row = rows.saturating_sub(2);
    let width = cols.saturating_sub(PAGE_COLUMN as usize);
    for (offset, line) in view.page.lines.iter().enumerate() {
        let row = PAGE_ROW + offset as u16;
        if row > last_row {
            break;
        }
        crossterm::queue!(
            stdout,
            cursor::MoveTo(PAGE_COLUMN, row),
            Print(truncate_with_ellipsis(line.clone(), width))
        )?;
    }

    if let Some((line, column, len)) = view.cursor.position() {
        let row = PAGE_ROW + line as u16;
        let col = PAGE_COLUMN as usize + column;
        if row <= last_row && col < cols {
            let text: String = view.page.lines[line]
                .chars()
                .skip(column)
                .take(len.min(cols - col))
                .collect();
            crossterm::queue!(
                stdout,
                cursor::MoveTo(col as u16, row),
                SetAttribute(Attribute::Underlined),
                Print(text),
                SetAttribute(Attribute::NoUnderline)
            )?;
        }
    }

    draw_popover(stdout, &view.session, cols, rows)
}

/// Lookup box anchored above the selected word, or below it when there is
/// no room above.
fn draw_popover(
    stdout: &mut Stdout,
    session: &ReaderSession,
    cols: usize,
    rows: u16,
) -> Result<()> {
    let (Some(word), Some(anchor)) = (session.selected_word(), session.selected_position()) else {
        return Ok(());
    };

    let inner_width = POPOVER_WIDTH.min(cols.saturating_sub(4));
    if inner_width < 10 {
        return Ok(());
    }

    let mut body = Vec::new();
    let definition = session.definition();
    if let Some(summary) = definition.summary() {
        body.push(summary.part_of_speech);
        body.extend(wrap_text(&summary.definition, inner_width));
        if let Some(example) = summary.example {
            body.push(String::new());
            body.push("Example:".to_string());
            body.extend(wrap_text(&format!("\"{example}\""), inner_width));
        }
    } else if let Some(message) = definition.status_message() {
        body.extend(wrap_text(&message, inner_width));
    }

    let height = body.len() as u16 + 4;
    let anchor_row = anchor.y.max(0.0) as u16;
    let top = if anchor_row >= height {
        anchor_row - height
    } else {
        (anchor_row + 1).min(rows.saturating_sub(height + 1))
    };
    let box_width = inner_width + 2;
    let left = (anchor.x.max(0.0) as usize)
        .saturating_sub(box_width / 2)
        .min(cols.saturating_sub(box_width)) as u16;

    let border = format!("+{}+", "-".repeat(inner_width));
    let mut row = top;
    print_inverted(stdout, left, row, &border)?;
    row += 1;
    let header = format!("{word}  [Esc]");
    print_inverted(
        stdout,
        left,
        row,
        &format!("|{:<inner_width$}|", truncate_with_ellipsis(header, inner_width)),
    )?;
    row += 1;
    print_inverted(stdout, left, row, &format!("|{}|", "-".repeat(inner_width)))?;
    row += 1;
    for line in body {
        print_inverted(
            stdout,
            left,
            row,
            &format!("|{:<inner_width$}|", truncate_with_ellipsis(line, inner_width)),
        )?;
        row += 1;
    }
    print_inverted(stdout, left, row, &border)?;
    Ok(())
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::queue!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::NoReverse)
    )?;
    Ok(())
}

fn combine_status(base: Option<String>, extra: Option<&str>) -> Option<String> {
    match (base, extra.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(extra)) => {
            base.push_str(" | ");
            base.push_str(extra);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(extra)) => Some(extra.to_string()),
        (None, None) => None,
    }
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate_with_ellipsis(text: String, width: usize) -> String {
    if text.chars().count() <= width {
        return text;
    }
    if width <= 3 {
        return text.chars().take(width).collect();
    }
    let mut truncated: String = text.chars().take(width - 3).collect();
    truncated.push_str("...");
    truncated
}

fn init_logging(project_dirs: &ProjectDirs, default_level: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "wordlens.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // The terminal is in raw mode while the reader runs, so only the file
    // receives output.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
