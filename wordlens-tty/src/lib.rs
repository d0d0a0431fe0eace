use std::io::{self, Write};
use std::time::Instant;

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use wordlens_core::{ReaderCommand, Rect, ViewerPage};

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(ReaderCommand),
    LibraryMove { delta: isize },
    OpenDocument,
    RequestRemove,
    ConfirmRemove,
    CancelRemove,
    MoveWord { delta: isize },
    MoveLine { delta: isize },
    SelectWord,
    SelectLine,
    Back,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Library,
    ConfirmRemove,
    Reader,
    Lookup,
}

/// Turns terminal events into reader inputs. Digits typed before a motion
/// key repeat it, as in a pager.
#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Release => UiEvent::None,
            Event::Key(key) => match self.mode {
                InputMode::Library => self.map_key_library(key),
                InputMode::ConfirmRemove => self.map_key_confirm(key),
                InputMode::Reader => self.map_key_reader(key),
                InputMode::Lookup => self.map_key_lookup(key),
            },
            Event::Mouse(mouse) => self.map_mouse(mouse),
            _ => UiEvent::None,
        }
    }

    fn map_key_library(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                self.push_digit(c);
                UiEvent::None
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                let count = self.take_count();
                UiEvent::LibraryMove {
                    delta: count as isize,
                }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                let count = self.take_count();
                UiEvent::LibraryMove {
                    delta: -(count as isize),
                }
            }
            (KeyCode::Enter, _) => {
                self.reset_count();
                UiEvent::OpenDocument
            }
            (KeyCode::Char('x'), _) | (KeyCode::Delete, _) => {
                self.reset_count();
                UiEvent::RequestRemove
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_confirm(&mut self, key: KeyEvent) -> UiEvent {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => UiEvent::ConfirmRemove,
            _ => UiEvent::CancelRemove,
        }
    }

    fn map_key_reader(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                self.push_digit(c);
                UiEvent::None
            }
            (KeyCode::Char(' '), _) => {
                self.reset_count();
                UiEvent::Command(ReaderCommand::Tap { at: Instant::now() })
            }
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, _) => UiEvent::MoveWord {
                delta: -(self.take_count() as isize),
            },
            (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, _) => UiEvent::MoveWord {
                delta: self.take_count() as isize,
            },
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => UiEvent::MoveLine {
                delta: -(self.take_count() as isize),
            },
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => UiEvent::MoveLine {
                delta: self.take_count() as isize,
            },
            (KeyCode::Enter, _) => {
                self.reset_count();
                UiEvent::SelectWord
            }
            (KeyCode::Char('V'), _) => {
                self.reset_count();
                UiEvent::SelectLine
            }
            (KeyCode::Char('d'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(ReaderCommand::ToggleDarkMode)
            }
            (KeyCode::Esc, _) => {
                self.reset_count();
                UiEvent::Command(ReaderCommand::DismissOverlay)
            }
            (KeyCode::Char('q'), _) | (KeyCode::Backspace, _) => {
                self.reset_count();
                UiEvent::Back
            }
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_lookup(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Enter, _) | (KeyCode::Char('q'), _) => {
                UiEvent::Command(ReaderCommand::CloseLookup)
            }
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            _ => UiEvent::None,
        }
    }

    fn map_mouse(&mut self, mouse: MouseEvent) -> UiEvent {
        match (self.mode, mouse.kind) {
            (InputMode::Reader, MouseEventKind::Down(MouseButton::Left)) => {
                UiEvent::Command(ReaderCommand::Tap { at: Instant::now() })
            }
            (InputMode::Lookup, MouseEventKind::Down(MouseButton::Left)) => {
                UiEvent::Command(ReaderCommand::CloseLookup)
            }
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, c: char) {
        let Some(digit) = c.to_digit(10) else {
            return;
        };
        let current = self.pending_count.unwrap_or(0);
        self.pending_count = Some(current.saturating_mul(10).saturating_add(digit as usize));
        self.pending_digits.push(c);
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WordSpan {
    column: usize,
    text: String,
}

/// Cursor over the words of a painted [`ViewerPage`]. Selections come back
/// as text plus a bounding box in terminal cells, which is what the reader
/// session expects from any viewer.
#[derive(Debug, Clone)]
pub struct WordCursor {
    origin_column: u16,
    origin_row: u16,
    lines: Vec<Vec<WordSpan>>,
    line: usize,
    word: usize,
}

impl WordCursor {
    pub fn new(page: &ViewerPage, origin_column: u16, origin_row: u16) -> Self {
        let lines: Vec<Vec<WordSpan>> = page.lines.iter().map(|line| split_words(line)).collect();
        let line = lines.iter().position(|words| !words.is_empty()).unwrap_or(0);
        Self {
            origin_column,
            origin_row,
            lines,
            line,
            word: 0,
        }
    }

    /// `(row offset, column, width)` of the highlighted word, relative to
    /// the page origin.
    pub fn position(&self) -> Option<(usize, usize, usize)> {
        let span = self.lines.get(self.line)?.get(self.word)?;
        Some((self.line, span.column, span.text.chars().count()))
    }

    pub fn move_words(&mut self, delta: isize) {
        let Some(words) = self.lines.get(self.line) else {
            return;
        };
        if words.is_empty() {
            return;
        }
        let last = words.len() as isize - 1;
        self.word = (self.word as isize + delta).clamp(0, last) as usize;
    }

    /// Moves to the nth line that has words, keeping the column roughly
    /// aligned.
    pub fn move_lines(&mut self, delta: isize) {
        let column = self.position().map(|(_, col, _)| col).unwrap_or(0);
        let mut remaining = delta.unsigned_abs();
        let mut line = self.line;
        while remaining > 0 {
            let next = if delta < 0 {
                (0..line).rev().find(|&idx| !self.lines[idx].is_empty())
            } else {
                (line + 1..self.lines.len()).find(|&idx| !self.lines[idx].is_empty())
            };
            match next {
                Some(idx) => line = idx,
                None => break,
            }
            remaining -= 1;
        }
        if line != self.line {
            self.line = line;
            self.word = self.lines[line]
                .iter()
                .rposition(|span| span.column <= column)
                .unwrap_or(0);
        }
    }

    pub fn selected_word(&self) -> Option<(String, Rect)> {
        let span = self.lines.get(self.line)?.get(self.word)?;
        Some((
            span.text.clone(),
            self.cell_rect(self.line, span.column, span.text.chars().count()),
        ))
    }

    /// The whole current line, which a viewer would report for a drag over
    /// several words.
    pub fn selected_line(&self) -> Option<(String, Rect)> {
        let words = self.lines.get(self.line)?;
        let first = words.first()?;
        let last = words.last()?;
        let end = last.column + last.text.chars().count();
        let text = words
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Some((text, self.cell_rect(self.line, first.column, end - first.column)))
    }

    fn cell_rect(&self, line: usize, column: usize, width: usize) -> Rect {
        Rect::new(
            self.origin_column as f32 + column as f32,
            self.origin_row as f32 + line as f32,
            width as f32,
            1.0,
        )
    }
}

fn split_words(line: &str) -> Vec<WordSpan> {
    let mut words = Vec::new();
    let mut current: Option<WordSpan> = None;
    for (column, ch) in line.chars().enumerate() {
        if ch.is_whitespace() {
            if let Some(span) = current.take() {
                words.push(span);
            }
        } else {
            current
                .get_or_insert_with(|| WordSpan {
                    column,
                    text: String::new(),
                })
                .text
                .push(ch);
        }
    }
    if let Some(span) = current {
        words.push(span);
    }
    words
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn left_click() -> Event {
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn page(lines: &[&str]) -> ViewerPage {
        ViewerPage {
            title: "t".into(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn library_numeric_prefix_scales_moves() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('3'))),
            UiEvent::None
        ));
        assert_eq!(mapper.pending_input().as_deref(), Some("3"));

        match mapper.map_event(key_event(KeyCode::Char('j'))) {
            UiEvent::LibraryMove { delta } => assert_eq!(delta, 3),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(mapper.pending_input().is_none());

        match mapper.map_event(key_event(KeyCode::Up)) {
            UiEvent::LibraryMove { delta } => assert_eq!(delta, -1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn library_remove_goes_through_confirmation() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('x'))),
            UiEvent::RequestRemove
        ));

        mapper.set_mode(InputMode::ConfirmRemove);
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('y'))),
            UiEvent::ConfirmRemove
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('n'))),
            UiEvent::CancelRemove
        ));
    }

    #[test]
    fn reader_space_and_click_are_taps() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Reader);

        for event in [key_event(KeyCode::Char(' ')), left_click()] {
            match mapper.map_event(event) {
                UiEvent::Command(ReaderCommand::Tap { .. }) => {}
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn clicks_outside_reader_are_not_taps() {
        let mut mapper = EventMapper::new();
        assert!(matches!(mapper.map_event(left_click()), UiEvent::None));

        mapper.set_mode(InputMode::Lookup);
        assert!(matches!(
            mapper.map_event(left_click()),
            UiEvent::Command(ReaderCommand::CloseLookup)
        ));
    }

    #[test]
    fn reader_maps_selection_and_overlay_keys() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Reader);

        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::SelectWord
        ));
        assert!(matches!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('V'),
                KeyModifiers::SHIFT
            )),
            UiEvent::SelectLine
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('d'))),
            UiEvent::Command(ReaderCommand::ToggleDarkMode)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::Command(ReaderCommand::DismissOverlay)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('q'))),
            UiEvent::Back
        ));
    }

    #[test]
    fn control_d_does_not_toggle_theme() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Reader);

        assert!(matches!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('d'),
                KeyModifiers::CONTROL
            )),
            UiEvent::None
        ));
    }

    #[test]
    fn reader_prefix_repeats_word_motion() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Reader);
        mapper.map_event(key_event(KeyCode::Char('2')));

        match mapper.map_event(key_event(KeyCode::Char('l'))) {
            UiEvent::MoveWord { delta } => assert_eq!(delta, 2),
            other => panic!("unexpected event: {:?}", other),
        }
        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::MoveLine { delta } => assert_eq!(delta, -1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn switching_modes_clears_pending_count() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('5')));
        mapper.set_mode(InputMode::Reader);
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn lookup_mode_closes_on_escape() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Lookup);
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::Command(ReaderCommand::CloseLookup)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::None
        ));
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut mapper = EventMapper::new();
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert!(matches!(mapper.map_event(release), UiEvent::None));
    }

    #[test]
    fn cursor_starts_on_first_word_and_reports_cell_bounds() {
        let cursor = WordCursor::new(&page(&["", "  hello world"]), 2, 3);
        let (word, rect) = cursor.selected_word().unwrap();
        assert_eq!(word, "hello");
        assert_eq!(rect, Rect::new(4.0, 4.0, 5.0, 1.0));
    }

    #[test]
    fn cursor_moves_between_words_and_skips_blank_lines() {
        let mut cursor = WordCursor::new(&page(&["one two three", "", "four five"]), 0, 0);
        cursor.move_words(2);
        assert_eq!(cursor.selected_word().unwrap().0, "three");
        cursor.move_words(10);
        assert_eq!(cursor.selected_word().unwrap().0, "three");

        cursor.move_lines(1);
        assert_eq!(cursor.position().map(|p| p.0), Some(2));
        assert_eq!(cursor.selected_word().unwrap().0, "five");

        cursor.move_lines(-5);
        assert_eq!(cursor.position().map(|p| p.0), Some(0));
    }

    #[test]
    fn line_selection_spans_all_words() {
        let mut cursor = WordCursor::new(&page(&["  look  it up"]), 0, 1);
        cursor.move_words(1);
        let (text, rect) = cursor.selected_line().unwrap();
        assert_eq!(text, "look it up");
        assert_eq!(rect, Rect::new(2.0, 1.0, 11.0, 1.0));
    }

    #[test]
    fn empty_page_has_no_selection() {
        let cursor = WordCursor::new(&page(&[]), 0, 0);
        assert!(cursor.selected_word().is_none());
        assert!(cursor.selected_line().is_none());
    }
}
