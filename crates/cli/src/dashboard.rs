use fluidvid::{DisplayedMessages, ProgressSnapshot};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

/// Title plus hardware line (2) and borders (2)
pub const HEADER_HEIGHT: u16 = 4;
/// One line of progress plus borders
pub const FOOTER_HEIGHT: u16 = 3;
/// Borders of the log panel
const CONTENT_BORDERS: u16 = 2;
/// Longest progress bar, in cells
pub const MAX_BAR_CELLS: usize = 50;

const ELLIPSIS: &str = "...";
const BORDER: Color = Color::LightBlue;

/// Static part of the dashboard
#[derive(Debug, Clone)]
pub struct Header {
    pub title: String,
    pub hardware: String,
}

/// How many log lines fit between header and footer; never less than one
pub fn visible_lines(terminal_height: u16) -> usize {
    terminal_height
        .saturating_sub(HEADER_HEIGHT + FOOTER_HEIGHT + CONTENT_BORDERS)
        .max(1) as usize
}

/// Cut `message` to `width` characters, marking the cut with an ellipsis
pub fn truncate_message(message: &str, width: usize) -> String {
    if message.chars().count() <= width {
        return message.to_string();
    }
    if width <= ELLIPSIS.len() {
        return message.chars().take(width).collect();
    }
    let kept: String = message.chars().take(width - ELLIPSIS.len()).collect();
    format!("{}{}", kept, ELLIPSIS)
}

/// `█` for done, `░` for remaining
pub fn progress_bar(snapshot: &ProgressSnapshot, cells: usize) -> String {
    let filled = if snapshot.total == 0 {
        0
    } else {
        (cells * snapshot.completed.min(snapshot.total)) / snapshot.total
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(cells - filled))
}

/// `Tasks: 3/6 (50.0%) [█████░░░░░] Current: 480p (VP9 (CPU))`
pub fn footer_text(snapshot: &ProgressSnapshot, width: usize) -> String {
    let tasks = format!(
        "Tasks: {}/{} ({:.1}%)",
        snapshot.completed,
        snapshot.total,
        snapshot.percent()
    );
    let current = if snapshot.current.is_empty() {
        String::new()
    } else {
        format!(" Current: {}", snapshot.current)
    };

    // tasks + " [" + bar + "]" + current
    let chrome = tasks.chars().count() + 3 + current.chars().count();
    let cells = width.saturating_sub(chrome).min(MAX_BAR_CELLS);
    format!("{} [{}]{}", tasks, progress_bar(snapshot, cells), current)
}

/// Success and failure lines get a marker and a colour
pub fn content_line(message: &str, width: usize) -> Line<'static> {
    let (marker, color) = if message.contains("Completed:") {
        ("✔ ", Some(Color::Green))
    } else if message.contains("Failed:") {
        ("✘ ", Some(Color::Red))
    } else {
        ("", None)
    };

    let body = truncate_message(message, width.saturating_sub(marker.chars().count()));
    match color {
        Some(c) => Line::from(Span::styled(format!("{}{}", marker, body), Style::default().fg(c))),
        None => Line::from(body),
    }
}

fn panel() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER))
}

/// Paint one full frame
pub fn draw(f: &mut Frame, header: &Header, messages: &DisplayedMessages, snapshot: &ProgressSnapshot) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(CONTENT_BORDERS + 1),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);

    render_header(f, header, chunks[0]);
    render_messages(f, messages, area.height, chunks[1]);
    render_footer(f, snapshot, chunks[2]);
}

fn render_header(f: &mut Frame, header: &Header, area: Rect) {
    let inner = area.width.saturating_sub(2) as usize;
    let text = vec![
        Line::from(Span::styled(
            truncate_message(&header.title, inner),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            truncate_message(&header.hardware, inner),
            Style::default().fg(Color::Cyan),
        )),
    ];
    f.render_widget(Paragraph::new(text).block(panel()), area);
}

fn render_messages(f: &mut Frame, messages: &DisplayedMessages, terminal_height: u16, area: Rect) {
    let inner = area.width.saturating_sub(2) as usize;
    let lines: Vec<Line> = messages
        .latest(visible_lines(terminal_height))
        .iter()
        .map(|m| content_line(m, inner))
        .collect();
    f.render_widget(Paragraph::new(lines).block(panel()), area);
}

fn render_footer(f: &mut Frame, snapshot: &ProgressSnapshot, area: Rect) {
    let inner = area.width.saturating_sub(2) as usize;
    let text = truncate_message(&footer_text(snapshot, inner), inner);
    let paragraph = Paragraph::new(Span::styled(
        text,
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
    ))
    .block(panel());
    f.render_widget(paragraph, area);
}
