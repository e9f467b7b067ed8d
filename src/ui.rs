use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::record::SessionRecord;
use crate::session::{CharStatus, KeyObservation, RenderState, SessionObserver, Stats};
use crate::suggest::Suggestion;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Everything the screen shows, updated only through the session observer
/// and redrawn from scratch each frame.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub render: Option<RenderState>,
    pub stats: Option<Stats>,
    pub last_key: Option<KeyObservation>,
    pub completed: Option<SessionRecord>,
    pub suggestions: Vec<Suggestion>,
}

impl ViewState {
    /// Forget the previous session; call before loading new text
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    /// True while the last keystroke was a miss on the current character
    pub fn missed_current(&self) -> bool {
        self.last_key.is_some_and(|k| !k.correct)
    }
}

impl SessionObserver for ViewState {
    fn on_render(&mut self, state: &RenderState) {
        self.render = Some(state.clone());
    }

    fn on_stats(&mut self, stats: &Stats) {
        self.stats = Some(*stats);
    }

    fn on_key(&mut self, key: &KeyObservation) {
        self.last_key = Some(*key);
    }

    fn on_complete(&mut self, record: &SessionRecord) {
        self.completed = Some(record.clone());
    }
}

/// How a target character is shown on screen
pub fn display_char(c: char) -> String {
    match c {
        '\n' => "⏎".to_string(),
        '\t' => "⇥".to_string(),
        c => c.to_string(),
    }
}

pub fn status_spans(text: &[char], state: &RenderState, missed: bool) -> Vec<Span<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let correct = bold.fg(Color::Green);
    let pending = bold.add_modifier(Modifier::DIM);
    let current = if missed {
        bold.fg(Color::Red).add_modifier(Modifier::UNDERLINED)
    } else {
        pending.add_modifier(Modifier::UNDERLINED)
    };

    text.iter()
        .zip(state.statuses.iter())
        .map(|(&c, status)| {
            let style = match status {
                CharStatus::Correct => correct,
                CharStatus::Current => current,
                CharStatus::Pending => pending,
            };
            Span::styled(display_char(c), style)
        })
        .collect()
}

pub fn stats_line(stats: &Stats) -> String {
    format!(
        "{} wpm   {:.1}% acc   {} errors   {}s",
        stats.wpm, stats.accuracy, stats.errors, stats.elapsed_seconds
    )
}

pub fn suggestions_line(suggestions: &[Suggestion]) -> String {
    if suggestions.is_empty() {
        return "no weak keys yet".to_string();
    }
    let keys = suggestions
        .iter()
        .map(|s| format!("{} ({:.1})", key_label(s.character), s.score))
        .collect::<Vec<String>>()
        .join("  ");
    format!("weak keys: {keys}")
}

pub fn key_label(c: char) -> String {
    match c {
        ' ' => "SPACE".to_string(),
        '\n' => "ENTER".to_string(),
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

pub fn draw(f: &mut Frame, view: &ViewState, text: &[char]) {
    if let Some(record) = &view.completed {
        draw_results(f, view, record);
    } else {
        draw_typing(f, view, text);
    }
}

fn draw_typing(f: &mut Frame, view: &ViewState, text: &[char]) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let stats = view.stats.as_ref().map(stats_line).unwrap_or_default();
    f.render_widget(
        Paragraph::new(Span::styled(
            stats,
            Style::default().add_modifier(Modifier::DIM | Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        chunks[0],
    );

    if let Some(state) = &view.render {
        let spans = status_spans(text, state, view.missed_current());
        f.render_widget(
            Paragraph::new(Line::from(spans)).wrap(Wrap { trim: false }),
            chunks[1],
        );
    }

    f.render_widget(
        Paragraph::new(Span::styled(
            "(esc) quit / (ctrl-r) restart / (ctrl-n) new drill",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        chunks[2],
    );
}

fn draw_results(f: &mut Frame, view: &ViewState, record: &SessionRecord) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let bold = Style::default().add_modifier(Modifier::BOLD);

    f.render_widget(
        Paragraph::new(Span::styled(
            format!(
                "{} wpm   {:.1}% acc   {} errors",
                record.wpm(),
                record.accuracy(),
                record.errors()
            ),
            bold,
        ))
        .block(Block::default().borders(Borders::ALL).title("Results"))
        .alignment(Alignment::Center),
        chunks[0],
    );

    let latency = match record.latency() {
        Some(l) => format!(
            "latency ms  avg {:.1}  p50 {:.1}  p90 {:.1}  p99 {:.1}  ({} samples)",
            l.avg, l.p50, l.p90, l.p99, l.count
        ),
        None => "latency: not enough samples".to_string(),
    };
    f.render_widget(
        Paragraph::new(latency).alignment(Alignment::Center),
        chunks[1],
    );

    f.render_widget(
        Paragraph::new(Span::styled(
            suggestions_line(&view.suggestions),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center),
        chunks[2],
    );

    f.render_widget(
        Paragraph::new(Span::styled(
            "(r)etry / (n)ew drill / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        chunks[4],
    );
}
