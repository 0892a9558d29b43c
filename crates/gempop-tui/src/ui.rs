use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use gempop_core::{ChatRole, Mode, RequestStatus};

use crate::app::{App, InputMode, ModeView, TextInput};

/// Ensure the selected item in a list is visible by adjusting the ListState offset.
fn ensure_selected_visible(state: &mut ListState, visible_height: usize) {
    let visible_height = visible_height.max(1);

    if let Some(selected) = state.selected() {
        // selected at the bottom .. selected at the top
        let min_offset = selected.saturating_sub(visible_height - 1);
        let max_offset = selected;

        let new_offset = state.offset().clamp(min_offset, max_offset);
        if new_offset != state.offset() {
            *state.offset_mut() = new_offset;
        }
    }
}

/// Hard-wrap editor text at `width` columns. A line that exactly fills its
/// last row gets an empty row after it so the cursor always has a cell.
fn wrap_input(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.split('\n') {
        if width == 0 {
            rows.push(line.to_string());
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        for start in (0..=chars.len()).step_by(width) {
            rows.push(chars[start..(start + width).min(chars.len())].iter().collect());
        }
    }
    rows
}

/// Cursor (row, col) within the rows produced by `wrap_input`
fn wrapped_cursor(input: &TextInput, width: usize) -> (usize, usize) {
    let (row, col) = input.cursor_row_col();
    if width == 0 {
        return (row, col);
    }
    let above: usize = input
        .text()
        .split('\n')
        .take(row)
        .map(|line| line.chars().count() / width + 1)
        .sum();
    (above + col / width, col % width)
}

/// Render **bold** runs and turn `* ` bullets into dots
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();

    let text = match text.trim_start().strip_prefix("* ") {
        Some(rest) => {
            let indent = text.len() - text.trim_start().len();
            current_text.push_str(&" ".repeat(indent));
            current_text.push_str("• ");
            rest
        }
        None => text,
    };

    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn markdown_text(text: &str) -> Vec<Line<'static>> {
    text.lines().map(parse_markdown_line).collect()
}

fn thinking_line(app: &App, label: &str) -> Line<'static> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat((app.animation_frame as usize) + 1);
    Line::from(Span::styled(
        format!("{}{}", label, dots),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    ))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, tab bar, hints
    let [header_area, body_area, tabs_area, hints_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    app.body_area = Some(body_area);

    render_header(app, frame, header_area);

    match app.mode {
        Mode::Chat => render_chat(app, frame, body_area),
        Mode::Search | Mode::Find => render_grounded_mode(app, frame, body_area),
        Mode::Translate | Mode::Summarize | Mode::Write => render_text_mode(app, frame, body_area),
    }

    render_tabs(app, frame, tabs_area);
    render_hints(app, frame, hints_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Gemini Pop ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.model_name().to_string(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles: Vec<Line> = Mode::all()
        .iter()
        .enumerate()
        .map(|(i, mode)| {
            let busy = if app.is_loading(*mode) { "*" } else { "" };
            Line::from(format!("{} {}{}", i + 1, mode.display_name(), busy))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.mode.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider("|");

    frame.render_widget(tabs, area);
}

fn render_hints(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let hints: Vec<(&str, &str)> = match (app.input_mode, app.mode) {
        (InputMode::Editing, Mode::Translate | Mode::Summarize | Mode::Write) => {
            vec![("Ctrl-S", "submit"), ("Enter", "newline"), ("Esc", "done")]
        }
        (InputMode::Editing, _) => vec![("Enter", "submit"), ("Esc", "done")],
        (InputMode::Normal, mode) => {
            let mut hints = vec![("Tab", "mode"), ("i", "edit")];
            match mode {
                Mode::Chat => hints.push(("c", "copy reply")),
                Mode::Search => hints.extend([("j/k", "sources"), ("o", "open"), ("c", "copy")]),
                Mode::Find => hints.extend([
                    ("l", "location"),
                    ("j/k", "places"),
                    ("o", "open"),
                    ("c", "copy"),
                ]),
                Mode::Translate => hints.extend([("[ ]", "language"), ("c", "copy")]),
                Mode::Summarize => hints.extend([("p", "demo text"), ("c", "copy")]),
                Mode::Write => hints.extend([("[ ]", "tone"), ("c", "copy")]),
            }
            hints.push(("q", "quit"));
            hints
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    if let Some(flash) = &app.flash {
        spans.push(Span::styled(
            format!("  {}", flash),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    let mut lines: Vec<Line> = Vec::new();
    let pending = app.chat.controller.pending_reply().map(|m| m.id);

    for msg in app.chat.controller.transcript().messages() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Model => {
                lines.push(Line::from(Span::styled(
                    "Gemini:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                if msg.is_error {
                    lines.push(Line::from(Span::styled(
                        msg.text.clone(),
                        Style::default().fg(Color::Red),
                    )));
                } else if msg.text.is_empty() && pending == Some(msg.id) {
                    lines.push(thinking_line(app, "Gemini is thinking"));
                } else {
                    lines.extend(markdown_text(&msg.text));
                }
            }
        }
        lines.push(Line::default());
    }

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });

    // Keep the newest content in view unless the user scrolled away
    let inner_width = chat_area.width.saturating_sub(2);
    let inner_height = chat_area.height.saturating_sub(2) as usize;
    let total = chat.line_count(inner_width);
    let max_scroll = total.saturating_sub(inner_height).min(u16::MAX as usize) as u16;
    if app.chat.follow || app.chat.scroll >= max_scroll {
        app.chat.scroll = max_scroll;
        app.chat.follow = true;
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let chat = chat.block(chat_block).scroll((app.chat.scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    render_line_input(frame, input_area, &app.chat.input, " Ask anything... ", editing);
}

/// Single-line input with horizontal scrolling, as used by chat, search and find
fn render_line_input(frame: &mut Frame, area: Rect, input: &TextInput, title: &str, editing: bool) {
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let widget = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(widget, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn grounded_title(mode: Mode, use_location: bool) -> String {
    match mode {
        Mode::Find => {
            let location = if use_location { "on" } else { "off" };
            format!(" Find places (location: {}) ", location)
        }
        _ => " Search the web ".to_string(),
    }
}

fn render_grounded_mode(app: &mut App, frame: &mut Frame, area: Rect) {
    let mode = app.mode;
    let title = grounded_title(mode, app.use_location);
    let editing = app.input_mode == InputMode::Editing;
    let thinking = thinking_line(app, "Searching");

    let Some(view) = app.view_mut(mode) else {
        return;
    };

    let sources_height = if view.sources().is_empty() {
        0
    } else {
        (view.sources().len().min(6) + 2) as u16 // +2 for borders
    };

    let [input_area, result_area, sources_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(sources_height),
    ])
    .areas(area);

    render_line_input(frame, input_area, &view.input, &title, editing);

    let placeholder = match mode {
        Mode::Find => "e.g., Coffee shops near me, Best pizza...",
        _ => "Search for recent news, facts, etc...",
    };
    render_output(frame, result_area, view, thinking, placeholder);

    if sources_height > 0 {
        let label = if mode == Mode::Find { " Places " } else { " Sources " };
        let items: Vec<ListItem> = view
            .sources()
            .iter()
            .enumerate()
            .map(|(i, source)| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!(" {}. {} ", i + 1, source.title)),
                    Span::styled(source.uri.clone(), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Magenta))
                    .title(format!("{}(o to open) ", label)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Magenta)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let visible_height = sources_area.height.saturating_sub(2) as usize;
        ensure_selected_visible(&mut view.sources, visible_height);
        frame.render_stateful_widget(list, sources_area, &mut view.sources);
    }
}

/// Result pane shared by every single-result mode
fn render_output(frame: &mut Frame, area: Rect, view: &ModeView, thinking: Line<'static>, placeholder: &str) {
    let controller = &view.controller;
    let border_color = match controller.status() {
        RequestStatus::Error => Color::Red,
        RequestStatus::Done => Color::Green,
        _ => Color::DarkGray,
    };

    let text = match (controller.status(), controller.output()) {
        (RequestStatus::Loading, _) => Text::from(thinking),
        (RequestStatus::Error, Some(output)) => Text::from(Span::styled(
            output.text().to_string(),
            Style::default().fg(Color::Red),
        )),
        (_, Some(output)) => Text::from(markdown_text(output.text())),
        (_, None) => Text::from(Span::styled(
            placeholder.to_string(),
            Style::default().fg(Color::DarkGray),
        )),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Result ");

    let widget = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((view.scroll, 0));
    frame.render_widget(widget, area);
}

fn render_text_mode(app: &mut App, frame: &mut Frame, area: Rect) {
    let mode = app.mode;
    let editing = app.input_mode == InputMode::Editing;

    let (input_title, placeholder, busy_label) = match mode {
        Mode::Translate => (
            format!(" Translate to {} ", app.language()),
            "Enter text to translate...",
            "Translating",
        ),
        Mode::Summarize => (
            " Summarize ".to_string(),
            "Paste text here to summarize... (p pastes demo text)",
            "Summarizing",
        ),
        _ => (
            format!(" Rewrite: {} tone ", app.tone.as_str()),
            "Type your draft here (e.g. an email, a tweet)...",
            "Rewriting",
        ),
    };
    let thinking = thinking_line(app, busy_label);

    let Some(view) = app.view(mode) else {
        return;
    };

    let [input_area, output_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(area);

    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(input_title);

    // Keep the cursor row in view
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let inner_height = input_area.height.saturating_sub(2) as usize;
    let (row, col) = wrapped_cursor(&view.input, inner_width);
    let v_offset = if inner_height > 0 && row >= inner_height {
        row - inner_height + 1
    } else {
        0
    };

    let input_text = if view.input.is_empty() && !editing {
        Text::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Text::from(
            wrap_input(view.input.text(), inner_width)
                .into_iter()
                .map(Line::from)
                .collect::<Vec<_>>(),
        )
    };

    let input = Paragraph::new(input_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block)
        .scroll((v_offset as u16, 0));
    frame.render_widget(input, input_area);

    if editing {
        frame.set_cursor_position((
            input_area.x + 1 + col as u16,
            input_area.y + 1 + (row - v_offset) as u16,
        ));
    }

    render_output(frame, output_area, view, thinking, "The result appears here.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gempop_core::geo::FixedLocation;
    use gempop_core::testing::ScriptedGateway;
    use gempop_core::{Config, LatLng, MemoryDraftStore};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    use crate::tui::AppEvent;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(
            &Config::new(),
            Arc::new(ScriptedGateway::new()),
            Arc::new(FixedLocation(LatLng { lat: 0.0, lng: 0.0 })),
            Arc::new(MemoryDraftStore::new()),
            tx,
        )
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_markdown_bold_and_bullets() {
        let line = parse_markdown_line("* **Cafe Uno** is open");
        let texts: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(texts, vec!["• ", "Cafe Uno", " is open"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let unclosed = parse_markdown_line("a **b");
        let text: String = unclosed.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a **b");
        assert!(unclosed.spans.iter().all(|s| s.style == Style::default()));
    }

    #[test]
    fn test_wrap_input_breaks_long_lines() {
        assert_eq!(wrap_input("abcdefg\nxy", 3), vec!["abc", "def", "g", "xy"]);
        assert_eq!(wrap_input("abc", 3), vec!["abc", ""]);
        assert_eq!(wrap_input("", 10), vec![""]);
    }

    #[test]
    fn test_wrapped_cursor_follows_rows() {
        let mut input = TextInput::new("");
        input.set("abcdefg\nxy");
        assert_eq!(wrapped_cursor(&input, 3), (3, 2));

        input.left();
        input.left();
        assert_eq!(wrapped_cursor(&input, 3), (3, 0));

        input.home();
        assert_eq!(wrapped_cursor(&input, 3), (0, 0));

        input.set("abc");
        assert_eq!(wrapped_cursor(&input, 3), (1, 0));
    }

    #[test]
    fn test_every_mode_renders() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        for mode in Mode::all() {
            app.set_mode(mode);
            terminal.draw(|frame| render(&mut app, frame)).unwrap();
            let screen = screen_text(&terminal);
            assert!(screen.contains("Gemini Pop"));
            assert!(screen.contains(mode.display_name()));
        }
    }

    #[test]
    fn test_chat_greeting_is_visible() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("How can I help you"));
        assert!(app.chat.follow);
    }

    #[test]
    fn test_pasted_text_wraps_in_input() {
        let mut app = test_app();
        app.set_mode(Mode::Summarize);
        app.view_mut(Mode::Summarize).unwrap().input.set(&"word ".repeat(60));
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let cells = terminal.backend().buffer().content();
        let filled = cells
            .chunks(80)
            .filter(|row| {
                let text: String = row.iter().map(|cell| cell.symbol()).collect();
                text.contains("word word")
            })
            .count();
        assert!(filled >= 3, "input was not wrapped");
    }

    #[tokio::test]
    async fn test_chat_follows_long_unbroken_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(ScriptedGateway::new());
        let long_url = format!("https://example.com/{}", "a".repeat(150));
        let reply = format!("See {}\nENDMARK", long_url);
        gateway.push_stream(vec![Ok(reply.as_str())]);
        let mut app = App::new(
            &Config::new(),
            gateway.clone(),
            Arc::new(FixedLocation(LatLng { lat: 0.0, lng: 0.0 })),
            Arc::new(MemoryDraftStore::new()),
            tx,
        );

        app.chat.input.set("link please");
        app.submit();
        loop {
            let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let done = matches!(event, AppEvent::ChatFinished { .. });
            app.apply_event(event);
            if done {
                break;
            }
        }

        let mut terminal = Terminal::new(TestBackend::new(40, 16)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        assert!(screen_text(&terminal).contains("ENDMARK"));
    }
}
