//! Terminal preview for an accordion instance.
//!
//! Renders the item list with per-item open/close state, drives the
//! user-input and navigation trigger paths from the keyboard, and rebuilds
//! the instance when the source file changes on disk.

use crate::dom::Document;
use crate::hash::{MemoryNavigator, Navigator};
use crate::instance::{mount_collection_file, Accordion, MountOptions};
use crate::item::ItemContent;
use crate::state::ItemState;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use notify::{RecursiveMode, Watcher};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// The preview application state.
pub struct PreviewApp {
    doc: Document,
    accordion: Accordion,
    nav: MemoryNavigator,
    selected: usize,
    status_line: String,
    should_quit: bool,
}

impl PreviewApp {
    pub fn new(doc: Document, accordion: Accordion) -> Self {
        let items = accordion.items().len();
        Self {
            doc,
            accordion,
            nav: MemoryNavigator::new(),
            selected: 0,
            status_line: format!("{} items", items),
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Swap in a freshly-built instance (source file changed).
    fn replace(&mut self, doc: Document, accordion: Accordion) {
        self.selected = self.selected.min(accordion.items().len().saturating_sub(1));
        self.doc = doc;
        self.accordion = accordion;
        self.nav = MemoryNavigator::new();
        self.status_line = "source reloaded".to_string();
    }

    /// Settle overdue transitions.
    fn tick(&mut self) {
        self.accordion.tick(&mut self.doc, Instant::now());
    }

    fn selected_id(&self) -> Option<String> {
        self.accordion
            .items()
            .get(self.selected)
            .map(|item| item.id.clone())
    }

    pub fn on_key(&mut self, key: event::KeyEvent) {
        if key.kind != event::KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.accordion.items().len().saturating_sub(1);
                self.selected = (self.selected + 1).min(last);
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(id) = self.selected_id() {
                    self.accordion
                        .user_toggle(&mut self.doc, &mut self.nav, &id, Instant::now());
                    self.status_line = format!("toggled {}", id);
                }
            }
            // Simulate a hash navigation to the selected item.
            KeyCode::Char('n') => {
                if let Some(id) = self.selected_id() {
                    self.nav.navigate_to(&id);
                    self.accordion
                        .handle_navigation(&mut self.doc, &mut self.nav, Instant::now());
                    self.status_line = format!("navigated to #{}", id);
                }
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            _ => {}
        }
    }

    /// Render the preview.
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3)])
            .split(size);

        self.render_status_bar(frame, chunks[0]);
        self.render_items(frame, chunks[1]);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let fragment = self
            .nav
            .fragment()
            .map(|f| format!("#{}", f))
            .unwrap_or_else(|| "(no fragment)".to_string());
        let status = Paragraph::new(Line::from(vec![
            Span::styled(
                " concertina preview ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(fragment, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status_line, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(
                "Enter: toggle | n: navigate | q: quit",
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        frame.render_widget(status, area);
    }

    fn render_items(&self, frame: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        for (index, item) in self.accordion.items().iter().enumerate() {
            let state = self
                .accordion
                .state(&item.id)
                .unwrap_or(ItemState::Closed);
            let marker = match state {
                ItemState::Closed => "▸",
                ItemState::Open => "▾",
                ItemState::Opening | ItemState::Closing => "~",
            };
            let style = if index == self.selected {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!(" {} {}  [{}]", marker, item.title, item.id),
                style,
            )));
            if state.is_open() {
                lines.push(Line::from(Span::styled(
                    format!("     {}", content_snippet(&item.content)),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}

fn content_snippet(content: &ItemContent) -> String {
    match content {
        ItemContent::Nodes(nodes) => format!("({} relocated nodes)", nodes.len()),
        ItemContent::Fragment(html) => {
            let text: String = html
                .chars()
                .filter(|c| !c.is_control())
                .take(70)
                .collect();
            if html.len() > 70 {
                format!("{}...", text)
            } else {
                text
            }
        }
    }
}

/// Build a collection-mode instance from a source file.
fn build_instance(
    source: &Path,
    attrs: &[(String, String)],
) -> anyhow::Result<(Document, Accordion)> {
    mount_collection_file(
        source,
        attrs,
        MountOptions {
            global_config: crate::config::load_global_overlay(),
            ..MountOptions::default()
        },
    )
}

/// Run the TUI preview until the user quits.
pub fn run_preview(source: PathBuf, attrs: Vec<(String, String)>) -> anyhow::Result<()> {
    let (doc, accordion) = build_instance(&source, &attrs)?;
    let mut app = PreviewApp::new(doc, accordion);

    let (watch_tx, watch_rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(watch_tx)?;
    watcher.watch(&source, RecursiveMode::NonRecursive)?;

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &mut app, &watch_rx, &source, &attrs);
    restore_terminal(&mut terminal)?;
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut PreviewApp,
    watch_rx: &mpsc::Receiver<notify::Result<notify::Event>>,
    source: &Path,
    attrs: &[(String, String)],
) -> anyhow::Result<()> {
    loop {
        app.tick();
        terminal.draw(|frame| app.render(frame))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.on_key(key);
            }
        }

        let mut changed = false;
        while let Ok(event) = watch_rx.try_recv() {
            if event.is_ok() {
                changed = true;
            }
        }
        if changed {
            match build_instance(source, attrs) {
                Ok((doc, accordion)) => app.replace(doc, accordion),
                Err(e) => app.status_line = format!("reload failed: {}", e),
            }
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

/// Setup the terminal for TUI mode
pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to normal mode
pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
