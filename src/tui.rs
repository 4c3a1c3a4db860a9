use crate::client::TransformBackend;
use crate::differ::{Differ, LineTag};
use crate::i18n::I18n;
use crate::router::route_for;
use crate::scroll_sync::{Pane, ScrollAnimation, ScrollSync};
use crate::session::Session;
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::Once;
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthStr;

const FRAME: Duration = Duration::from_millis(16);
const IDLE_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Command,
    Pane(Pane),
}

/// Work the event loop has to await after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Submit,
    Retry,
    Save,
    Quit,
}

pub struct EditorApp<'a, B> {
    pub session: Session<B>,
    i18n: &'a I18n,
    file: Option<PathBuf>,
    focus: Focus,
    offsets: [usize; 2],
    animations: [Option<ScrollAnimation>; 2],
    sync: ScrollSync,
    history_open: bool,
    history_state: ListState,
    status: Option<String>,
    busy: bool,
    pane_areas: [Rect; 2],
    page: usize,
}

fn slot(pane: Pane) -> usize {
    match pane {
        Pane::Source => 0,
        Pane::Diff => 1,
    }
}

impl<'a, B: TransformBackend> EditorApp<'a, B> {
    pub fn new(session: Session<B>, i18n: &'a I18n, file: Option<PathBuf>, debounce: Duration) -> Self {
        Self {
            session,
            i18n,
            file,
            focus: Focus::Command,
            offsets: [0; 2],
            animations: [None; 2],
            sync: ScrollSync::new(debounce),
            history_open: false,
            history_state: ListState::default(),
            status: None,
            busy: false,
            pane_areas: [Rect::default(); 2],
            page: 10,
        }
    }

    pub fn offset(&self, pane: Pane) -> usize {
        self.offsets[slot(pane)]
    }

    fn content_len(&self, pane: Pane) -> usize {
        let editor = &self.session.editor;
        match pane {
            Pane::Source => editor.original_text.lines().count(),
            Pane::Diff => Differ::diff_lines(&editor.original_text, &editor.edited_text).len(),
        }
    }

    /// User scroll of `pane` by `delta` lines.
    pub fn scroll_by(&mut self, pane: Pane, delta: isize, now: Instant) {
        let max = self.content_len(pane).saturating_sub(1);
        let current = self.offsets[slot(pane)];
        let next = current.saturating_add_signed(delta).min(max);
        // A user scroll wins over an in-flight mirrored animation.
        if self.animations[slot(pane)].take().is_some() {
            self.sync.settle(pane, current);
        }
        if next != current {
            self.offsets[slot(pane)] = next;
            self.sync.on_scroll(pane, next, now);
        }
    }

    /// Fire due mirrored writes and advance animations by one frame.
    pub fn tick(&mut self, now: Instant) {
        for write in self.sync.poll(now) {
            let i = slot(write.target);
            let max = self.content_len(write.target).saturating_sub(1);
            let target = write.offset.min(max);
            if let Some(anim) = self.animations[i].as_mut() {
                anim.retarget(target);
            } else {
                self.animations[i] = Some(ScrollAnimation::new(self.offsets[i], target));
            }
        }

        for pane in [Pane::Source, Pane::Diff] {
            let i = slot(pane);
            let Some(anim) = self.animations[i].as_mut() else { continue };
            if !anim.is_done() {
                self.offsets[i] = anim.step();
            }
            if anim.is_done() {
                let settled = anim.target();
                self.animations[i] = None;
                self.sync.settle(pane, settled);
            }
        }
    }

    fn animating(&self) -> bool {
        self.animations.iter().any(Option::is_some)
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        if self.animating() {
            return FRAME;
        }
        self.sync
            .next_deadline(now)
            .map(|d| d.max(Duration::from_millis(1)))
            .unwrap_or(IDLE_POLL)
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => return Action::Quit,
                KeyCode::Char('r') => {
                    // A shown error that cannot be retried keeps Ctrl-R inert.
                    let retryable = self.session.editor.error().map_or(true, |e| e.retryable);
                    return if retryable { Action::Retry } else { Action::None };
                }
                KeyCode::Char('s') => return Action::Save,
                KeyCode::Char('o') => {
                    self.toggle_history();
                    return Action::None;
                }
                _ => {}
            }
        }

        if self.history_open {
            return self.handle_history_key(key);
        }

        match key.code {
            KeyCode::Esc => {
                self.session.editor.dismiss_error();
                self.status = None;
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Command => Focus::Pane(Pane::Source),
                    Focus::Pane(Pane::Source) => Focus::Pane(Pane::Diff),
                    Focus::Pane(Pane::Diff) => Focus::Command,
                };
            }
            KeyCode::Enter => return Action::Submit,
            KeyCode::Up | KeyCode::Down | KeyCode::PageUp | KeyCode::PageDown => {
                let pane = match self.focus {
                    Focus::Pane(p) => p,
                    Focus::Command => Pane::Source,
                };
                let page = self.page as isize;
                let delta = match key.code {
                    KeyCode::Up => -1,
                    KeyCode::Down => 1,
                    KeyCode::PageUp => -page,
                    _ => page,
                };
                self.scroll_by(pane, delta, now);
            }
            KeyCode::Backspace if self.focus == Focus::Command => {
                self.session.editor.command.pop();
            }
            KeyCode::Char(c) if self.focus == Focus::Command && !ctrl => {
                self.session.editor.command.push(c);
            }
            KeyCode::Backspace => {
                if let Focus::Pane(pane) = self.focus {
                    self.edit_pane(pane, None);
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Focus::Pane(pane) = self.focus {
                    self.edit_pane(pane, Some(c));
                }
            }
            _ => {}
        }
        Action::None
    }

    /// Append to or pop from the end of a pane's text. The source pane
    /// edits the original, the diff pane edits the result.
    fn edit_pane(&mut self, pane: Pane, c: Option<char>) {
        let editor = &mut self.session.editor;
        let mut text = match pane {
            Pane::Source => editor.original_text.clone(),
            Pane::Diff => editor.edited_text.clone(),
        };
        match c {
            Some(c) => text.push(c),
            None => {
                text.pop();
            }
        }
        match pane {
            Pane::Source => editor.set_original(text),
            Pane::Diff => editor.edit_result(text),
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> Action {
        let len = self.session.ledger.len();
        let selected = self.history_state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Esc => self.history_open = false,
            KeyCode::Up | KeyCode::Char('k') => {
                self.history_state.select(Some(selected.saturating_sub(1)));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if len > 0 {
                    self.history_state.select(Some((selected + 1).min(len - 1)));
                }
            }
            KeyCode::Enter => {
                if let Some(id) = self.session.ledger.list_all().get(selected).map(|r| r.id.clone()) {
                    self.session.reuse(&id);
                    self.offsets = [0; 2];
                    self.animations = [None; 2];
                    self.history_open = false;
                    self.focus = Focus::Command;
                }
            }
            _ => {}
        }
        Action::None
    }

    fn toggle_history(&mut self) {
        self.history_open = !self.history_open;
        if self.history_open {
            self.history_state.select(Some(0));
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let delta = match mouse.kind {
            MouseEventKind::ScrollUp => -3,
            MouseEventKind::ScrollDown => 3,
            _ => return,
        };
        for pane in [Pane::Source, Pane::Diff] {
            let r = self.pane_areas[slot(pane)];
            let inside = mouse.column >= r.x
                && mouse.column < r.x + r.width
                && mouse.row >= r.y
                && mouse.row < r.y + r.height;
            if inside {
                self.scroll_by(pane, delta, now);
            }
        }
    }

    fn latest_id(&self) -> Option<String> {
        self.session.ledger.latest().map(|r| r.id.clone())
    }

    pub async fn submit(&mut self) {
        self.status = None;
        let before = self.latest_id();
        let _ = self.session.submit().await;
        self.after_dispatch(before);
    }

    pub async fn retry(&mut self) {
        self.status = None;
        let before = self.latest_id();
        let _ = self.session.retry().await;
        self.after_dispatch(before);
    }

    fn after_dispatch(&mut self, before: Option<String>) {
        // Keep the newest record in view when the history list is open.
        if self.latest_id() != before && self.history_open {
            self.history_state.select(Some(0));
        }
        self.offsets[slot(Pane::Diff)] = 0;
        self.animations[slot(Pane::Diff)] = None;
    }

    pub fn save(&mut self) -> Result<()> {
        match &self.file {
            Some(path) => {
                std::fs::write(path, &self.session.editor.edited_text)
                    .with_context(|| self.i18n.t("error_write_result"))?;
                self.status = Some(self.i18n.t_format("tui_saved", &[&path.display().to_string()]));
                tracing::info!(path = %path.display(), "saved edited text");
            }
            None => self.status = Some(self.i18n.t("tui_no_file")),
        }
        Ok(())
    }

    fn draw(&mut self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(f.size());
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);
        self.pane_areas = [panes[0], panes[1]];
        self.page = panes[0].height.saturating_sub(2).max(1) as usize;

        let editor = &self.session.editor;
        let source = Paragraph::new(editor.original_text.as_str())
            .block(self.pane_block(Pane::Source, "tui_source_title"))
            .scroll((self.offset(Pane::Source) as u16, 0));
        f.render_widget(source, panes[0]);

        let diff_lines: Vec<Line> = Differ::diff_lines(&editor.original_text, &editor.edited_text)
            .into_iter()
            .map(|line| match line.tag {
                LineTag::Insert => Line::styled(format!("+{}", line.text), Style::default().fg(Color::Green)),
                LineTag::Delete => Line::styled(format!("-{}", line.text), Style::default().fg(Color::Red)),
                LineTag::Equal => Line::raw(format!(" {}", line.text)),
            })
            .collect();
        let diff = Paragraph::new(Text::from(diff_lines))
            .block(self.pane_block(Pane::Diff, "tui_diff_title"))
            .scroll((self.offset(Pane::Diff) as u16, 0));
        f.render_widget(diff, panes[1]);

        let route = route_for(&editor.command);
        let command_title = format!("{} [{}]", self.i18n.t("tui_command_title"), route);
        let mut command_block = Block::default().borders(Borders::ALL).title(command_title);
        if self.focus == Focus::Command {
            command_block = command_block.border_style(Style::default().fg(Color::Cyan));
        }
        f.render_widget(Paragraph::new(editor.command.as_str()).block(command_block), rows[1]);
        if self.focus == Focus::Command && !self.history_open {
            let typed = UnicodeWidthStr::width(editor.command.as_str()).min(usize::from(u16::MAX)) as u16;
            let x = rows[1].x.saturating_add(1).saturating_add(typed);
            f.set_cursor(x.min(rows[1].right().saturating_sub(2)), rows[1].y + 1);
        }

        f.render_widget(Paragraph::new(self.status_line()), rows[2]);
        f.render_widget(
            Paragraph::new(self.i18n.t("tui_hint")).style(Style::default().fg(Color::DarkGray)),
            rows[3],
        );

        if self.history_open {
            self.draw_history(f);
        }
    }

    fn pane_block(&self, pane: Pane, title_key: &str) -> Block<'static> {
        let block = Block::default().borders(Borders::ALL).title(self.i18n.t(title_key));
        if self.focus == Focus::Pane(pane) {
            block.border_style(Style::default().fg(Color::Cyan))
        } else {
            block
        }
    }

    fn status_line(&self) -> Line<'static> {
        if self.busy {
            return Line::styled(self.i18n.t("tui_processing"), Style::default().fg(Color::Yellow));
        }
        if let Some(err) = self.session.editor.error() {
            let mut spans = vec![Span::styled(
                self.i18n.t(err.key),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )];
            if err.retryable {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(self.i18n.t("tui_retry_hint"), Style::default().fg(Color::DarkGray)));
            }
            return Line::from(spans);
        }
        if let Some(status) = &self.status {
            return Line::styled(status.clone(), Style::default().fg(Color::Green));
        }
        let editor = &self.session.editor;
        let summary = Differ::change_summary(&editor.original_text, &editor.edited_text);
        let mut text = self.i18n.t_format(
            "diff_word_summary",
            &[&summary.words_inserted.to_string(), &summary.words_deleted.to_string()],
        );
        if !self.session.ledger.is_persistent() {
            text.push_str(&format!("  ({})", self.i18n.t("tui_memory_only")));
        }
        Line::raw(text)
    }

    fn draw_history(&mut self, f: &mut Frame) {
        let area = centered(f.size(), 80, 70);
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .session
            .ledger
            .list_all()
            .iter()
            .map(|r| {
                let (mark, color) = if r.success { ("✓", Color::Green) } else { ("✗", Color::Red) };
                let text = truncate_to_width(&format!("{} {}  {}", mark, r.local_time(), r.command), width);
                ListItem::new(Line::styled(text, Style::default().fg(color)))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(self.i18n.t("tui_history_title")))
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
        f.render_widget(Clear, area);
        f.render_stateful_widget(list, area, &mut self.history_state);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x.min(100)) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(percent_y.min(100)) / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

type Term = Terminal<CrosstermBackend<Stdout>>;

fn restore_terminal(use_alt_screen: bool) {
    let _ = terminal::disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, DisableMouseCapture);
    if use_alt_screen {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    print!("\x1b[?25h");
    let _ = stdout.flush();
}

fn setup_terminal(use_alt_screen: bool) -> Result<Term> {
    static INIT_CTRL_C: Once = Once::new();
    INIT_CTRL_C.call_once(|| {
        let _ = ctrlc::set_handler(move || {
            // Best-effort restore terminal state and exit with 130
            restore_terminal(true);
            std::process::exit(130);
        });
    });

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    if use_alt_screen {
        execute!(stdout, EnterAlternateScreen)?;
    }
    execute!(stdout, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Run the two-pane editor until the user quits.
pub async fn run<B: TransformBackend>(app: &mut EditorApp<'_, B>, use_alt_screen: bool) -> Result<()> {
    let mut terminal = match setup_terminal(use_alt_screen) {
        Ok(t) => t,
        Err(err) => {
            restore_terminal(use_alt_screen);
            eprintln!("{}", app.i18n.t("warning_interactive_failed"));
            return Err(err);
        }
    };

    let result = event_loop(app, &mut terminal).await;
    restore_terminal(use_alt_screen);
    result
}

async fn event_loop<B: TransformBackend>(app: &mut EditorApp<'_, B>, terminal: &mut Term) -> Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| app.draw(f))?;

        if !event::poll(app.poll_timeout(Instant::now()))? {
            continue;
        }
        let action = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key, Instant::now()),
            Event::Mouse(mouse) => {
                app.handle_mouse(mouse, Instant::now());
                Action::None
            }
            _ => Action::None,
        };

        match action {
            Action::None => {}
            Action::Quit => return Ok(()),
            Action::Save => {
                if let Err(err) = app.save() {
                    tracing::warn!(error = %err, "save failed");
                    app.status = Some(format!("{err:#}"));
                }
            }
            Action::Submit | Action::Retry => {
                // One request at a time: input is not read until it settles.
                app.busy = true;
                terminal.draw(|f| app.draw(f))?;
                if action == Action::Submit {
                    app.submit().await;
                } else {
                    app.retry().await;
                }
                app.busy = false;
            }
        }
    }
}
