//! UI layout and rendering logic for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use crate::block::is_cell_marker;
use crate::editor::{Document, MarkerState, TextBuffer};
use crate::utils::unicode::char_to_byte_index;

const ACTIVE: Color = Color::Rgb(150, 150, 150);
const FINISHED: Color = Color::Rgb(255, 220, 0);
const ERROR: Color = Color::Rgb(255, 100, 100);

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &mut App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(65), // Editor
            Constraint::Min(4),         // Console
            Constraint::Length(1),      // Status bar
        ])
        .split(frame.area());

    render_editor(frame, app, main_layout[0]);
    render_console(frame, app, main_layout[1]);
    render_status_bar(frame, app, main_layout[2]);

    // Render help overlay if requested
    if app.show_help {
        render_help_overlay(frame);
    }
}

/// Columns taken by line numbers and the marker bar.
pub fn gutter_width(doc: &Document) -> u16 {
    let digits = doc.line_count().max(1).ilog10() as u16 + 1;
    digits + 2
}

fn marker_color(state: MarkerState) -> Color {
    match state {
        MarkerState::Active => ACTIVE,
        MarkerState::Finished => FINISHED,
        MarkerState::Error => ERROR,
    }
}

fn render_editor(frame: &mut Frame, app: &mut App, area: Rect) {
    app.editor_area = area;
    let height = usize::from(area.height.saturating_sub(2));
    app.follow_cursor(height);

    let doc = app.doc();
    let digits = usize::from(gutter_width(doc) - 2);
    let selection = doc.selection();
    let last = doc.line_count().min(app.editor_top + height);

    let mut content_lines = Vec::new();
    for line in app.editor_top..last {
        let text = doc.line_text(line);
        let bar = match app.markers.state_at(doc.id, line) {
            Some(state) => Span::styled("▌", Style::default().fg(marker_color(state))),
            None => Span::raw(" "),
        };
        let base = if app.cell_highlight && is_cell_marker(text) {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default()
        };

        let mut spans = vec![
            Span::styled(format!("{:>digits$}", line + 1), Style::default().fg(Color::DarkGray)),
            bar,
            Span::raw(" "),
        ];
        match selection.filter(|(start, end)| start.line <= line && line <= end.line) {
            Some((start, end)) => {
                let from = if line == start.line { char_to_byte_index(text, start.column) } else { 0 };
                let to = if line == end.line { char_to_byte_index(text, end.column) } else { text.len() };
                spans.push(Span::styled(text[..from].to_string(), base));
                spans.push(Span::styled(text[from..to].to_string(), base.add_modifier(Modifier::REVERSED)));
                spans.push(Span::styled(text[to..].to_string(), base));
            }
            None => spans.push(Span::styled(text.to_string(), base)),
        }
        content_lines.push(Line::from(spans));
    }

    let titles = app
        .docs
        .iter()
        .enumerate()
        .map(|(index, open)| {
            let dirty = if open.is_modified() { "*" } else { "" };
            if index == app.active {
                format!("[{}{}]", open.name(), dirty)
            } else {
                format!(" {}{} ", open.name(), dirty)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let paragraph = Paragraph::new(Text::from(content_lines))
        .block(Block::default().borders(Borders::ALL).title(titles));
    frame.render_widget(paragraph, area);

    let cursor = doc.cursor();
    if !app.show_help && cursor.line >= app.editor_top && cursor.line < app.editor_top + height {
        let text = doc.line_text(cursor.line);
        let before = &text[..char_to_byte_index(text, cursor.column)];
        let x = area.x + 1 + gutter_width(doc) + before.width() as u16;
        let y = area.y + 1 + (cursor.line - app.editor_top) as u16;
        if x < area.x + area.width.saturating_sub(1) {
            frame.set_cursor_position((x, y));
        }
    }
}

fn render_console(frame: &mut Frame, app: &App, area: Rect) {
    let content_lines = app
        .console
        .lines()
        .iter()
        .map(|line| {
            let style = if line.is_error {
                Style::default().fg(ERROR)
            } else {
                Style::default()
            };
            Line::from(Span::styled(line.text.clone(), style))
        })
        .collect::<Vec<_>>();

    // Calculate scrolling
    let available_height = area.height.saturating_sub(2) as usize; // Account for borders
    let total_lines = content_lines.len();

    let title = if app.kernel_alive { "Console" } else { "Console (Python stopped)" };
    let mut paragraph = Paragraph::new(Text::from(content_lines))
        .block(Block::default().borders(Borders::ALL).title(title));

    if total_lines > available_height {
        let max_scroll = total_lines - available_height;
        let offset = app.console_scroll_offset.min(max_scroll);
        paragraph = paragraph.scroll(((max_scroll - offset) as u16, 0));
    }

    frame.render_widget(paragraph, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let python = if app.kernel_alive { "python" } else { "python: stopped" };
    let status_text = format!(" {} | {} | {}", app.exec_state, python, app.status_message);

    let status_paragraph =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(status_paragraph, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(70, 70, frame.area());

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Running code"),
        Line::from("  F5           - Run statement at cursor, move past it"),
        Line::from("  F6           - Run statement at cursor, stay"),
        Line::from("  F8           - Run the #%% cell around the cursor"),
        Line::from("  Middle click - Run the statement under the pointer"),
        Line::from("  Ctrl+R       - Restart Python (clears all variables)"),
        Line::from(""),
        Line::from("Console"),
        Line::from("  Ctrl+L       - Clear"),
        Line::from("  Ctrl+U       - Remove the last output"),
        Line::from("  PgUp/PgDn    - Scroll"),
        Line::from(""),
        Line::from("Files"),
        Line::from("  Ctrl+S       - Save"),
        Line::from("  Ctrl+N       - Next buffer"),
        Line::from("  Ctrl+K       - Log selection as a snippet (or open the log)"),
        Line::from(""),
        Line::from("  F1           - Toggle this help"),
        Line::from("  Ctrl+Q       - Quit (or Ctrl+C twice)"),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
