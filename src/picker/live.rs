// ABOUTME: Full-screen key-driven front end for the host picker.
// ABOUTME: Arrow keys move, typing filters, and the list is redrawn in place.

use super::{Navigator, Selection, filter, render_row};
use crate::config::HostDescriptor;
use crate::ssh::RawModeGuard;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, queue, style, terminal};
use std::io::{self, Write};

/// Rows shown at once; the window scrolls to keep the cursor visible.
pub const PAGE_SIZE: usize = 20;

/// Picker input, decoupled from the terminal's key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    /// Descend into a group or choose a leaf.
    Enter,
    /// Choose the row under the cursor even if it has children.
    ChooseHere,
    Back,
    Backspace,
    Char(char),
    Cancel,
    Ignored,
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        match event.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Key::Cancel,
            KeyCode::Char('p') if ctrl => Key::Up,
            KeyCode::Char('n') if ctrl => Key::Down,
            KeyCode::Char(_) if ctrl => Key::Ignored,
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Enter => Key::Enter,
            KeyCode::Tab => Key::ChooseHere,
            KeyCode::Left => Key::Back,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Esc => Key::Cancel,
            _ => Key::Ignored,
        }
    }
}

/// Result of feeding one key to the picker.
#[derive(Debug, Clone, Copy)]
pub enum Step<'a> {
    Continue,
    Chosen(&'a HostDescriptor),
    Cancelled,
}

/// Picker state: position in the tree, search text and the highlighted row.
#[derive(Debug, Clone)]
pub struct LiveSelect<'a> {
    nav: Navigator<'a>,
    query: String,
    cursor: usize,
}

impl<'a> LiveSelect<'a> {
    pub fn new(roots: &'a [HostDescriptor]) -> Self {
        Self {
            nav: Navigator::new(roots),
            query: String::new(),
            cursor: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Position of the highlighted row among the visible rows.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Indices into the current level that match the search text.
    pub fn visible(&self) -> Vec<usize> {
        filter(self.nav.nodes(), &self.query)
    }

    fn current(&self) -> Option<usize> {
        self.visible().get(self.cursor).copied()
    }

    pub fn handle(&mut self, key: Key) -> Step<'a> {
        match key {
            Key::Up => self.cursor = self.cursor.saturating_sub(1),
            Key::Down => {
                if self.cursor + 1 < self.visible().len() {
                    self.cursor += 1;
                }
            }
            Key::Enter => match self.current().and_then(|i| self.nav.select(i)) {
                Some(Selection::Chosen(host)) => return Step::Chosen(host),
                Some(Selection::Descended) => {
                    self.query.clear();
                    self.cursor = 0;
                }
                None => {}
            },
            Key::ChooseHere => {
                if let Some(host) = self.current().and_then(|i| self.nav.choose(i)) {
                    return Step::Chosen(host);
                }
            }
            Key::Back => self.back(),
            Key::Backspace => {
                if self.query.pop().is_some() {
                    self.cursor = 0;
                } else {
                    self.back();
                }
            }
            Key::Char(c) => {
                self.query.push(c);
                self.cursor = 0;
            }
            Key::Cancel => return Step::Cancelled,
            Key::Ignored => {}
        }
        Step::Continue
    }

    fn back(&mut self) {
        if self.nav.back() {
            // unfiltered, so the remembered index is also the row position
            self.query.clear();
            self.cursor = self.nav.selected();
        }
    }

    /// Lines to draw for the current state, at most `page` host rows.
    pub fn render(&self, page: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let path = self.nav.path();
        if path.is_empty() {
            lines.push("✨ select host".to_string());
        } else {
            lines.push(format!("✨ select host ({})", path.join(" / ")));
        }
        lines.push(format!("🔍 {}", self.query));

        let visible = self.visible();
        if visible.is_empty() {
            lines.push("  no matching hosts".to_string());
        }
        let start = (self.cursor + 1).saturating_sub(page);
        let nodes = self.nav.nodes();
        for (position, &index) in visible.iter().enumerate().skip(start).take(page) {
            lines.push(render_row(&nodes[index], position == self.cursor));
        }

        let back = if self.nav.depth() > 0 { ", ← back" } else { "" };
        lines.push(format!("↑/↓ move, enter select, tab choose here{back}, esc quit"));
        lines
    }
}

/// Run the key-driven picker on the controlling terminal.
///
/// The terminal is in raw mode only while the picker is shown.
pub fn pick_live(roots: &[HostDescriptor]) -> io::Result<Option<&HostDescriptor>> {
    let guard = RawModeGuard::enable()?;
    let mut stdout = io::stdout();
    let mut select = LiveSelect::new(roots);
    let mut drawn = 0;

    let outcome = loop {
        drawn = redraw(&mut stdout, &select.render(PAGE_SIZE), drawn)?;

        let Event::Key(event) = event::read()? else {
            continue;
        };
        if event.kind != KeyEventKind::Press {
            continue;
        }
        match select.handle(Key::from(event)) {
            Step::Continue => {}
            Step::Chosen(host) => break Some(host),
            Step::Cancelled => break None,
        }
    };

    redraw(&mut stdout, &[], drawn)?;
    guard.restore()?;
    Ok(outcome)
}

/// Replace the previous `drawn` lines with `lines`; returns the new count.
fn redraw<W: Write>(out: &mut W, lines: &[String], drawn: u16) -> io::Result<u16> {
    if drawn > 0 {
        queue!(out, cursor::MoveUp(drawn))?;
    }
    queue!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::FromCursorDown)
    )?;
    for line in lines {
        queue!(out, style::Print(line), style::Print("\r\n"))?;
    }
    out.flush()?;
    Ok(u16::try_from(lines.len()).unwrap_or(u16::MAX))
}
