use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::app::App;
use crate::state::{ChatMessage, ChatRole};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c != '*' || chars.peek() != Some(&'*') {
            current_text.push(c);
            continue;
        }
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

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.session.is_fresh() {
        let [welcome_area, chat_area] = Layout::vertical([
            Constraint::Length(5),
            Constraint::Min(0),
        ])
        .areas(body_area);
        render_welcome(frame, welcome_area);
        render_chat(app, frame, chat_area);
    } else {
        render_chat(app, frame, body_area);
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = if app.is_pending() {
        Span::styled(" searching ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        Span::styled(" online ", Style::default().bg(Color::Green).fg(Color::Black))
    };

    let title = Line::from(vec![
        Span::styled(" RAG Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{} messages ", app.session.messages().len()),
            Style::default().fg(Color::White),
        ),
        status,
        Span::styled(format!(" {} ", app.endpoint()), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_welcome(frame: &mut Frame, area: Rect) {
    let step = |n: &str, text: &str| {
        Line::from(vec![
            Span::styled(format!(" {} ", n), Style::default().fg(Color::Cyan).bold()),
            Span::raw(text.to_string()),
        ])
    };

    let card = Paragraph::new(vec![
        step("1", "Ask your question in plain language"),
        step("2", "The assistant searches your documents for relevant passages"),
        step("3", "Get an answer along with the sources it used"),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title(" How to use the assistant "),
    )
    .wrap(Wrap { trim: true });

    frame.render_widget(card, area);
}

fn message_lines(msg: &ChatMessage, lines: &mut Vec<Line<'static>>) {
    let label = match msg.role {
        ChatRole::User => Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        ChatRole::Assistant => Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    };
    lines.push(Line::from(label));

    for line in msg.content.lines() {
        lines.push(parse_markdown_line(line));
    }

    if let Some(sources) = &msg.sources {
        let mut spans = vec![Span::styled(
            "Sources: ",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )];
        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(
                format!("[{}]", source),
                Style::default().fg(Color::Magenta),
            ));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::default());
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.session.messages() {
        message_lines(msg, &mut lines);
    }

    if app.is_pending() {
        lines.push(Line::from(Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Searching documents{}", dots),
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_text = if app.session.messages().is_empty() && !app.is_pending() {
        Text::from(Span::styled(
            "Ask a question about your documents...",
            Style::default().fg(Color::Gray),
        ))
    } else {
        Text::from(chat_lines(app))
    };

    let chat = Paragraph::new(chat_text).wrap(Wrap { trim: false });

    // Measured before the border is attached so only content rows count
    let total = chat.line_count(app.chat_width).min(u16::MAX as usize) as u16;
    app.chat_max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_latest {
        app.chat_scroll = app.chat_max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(app.chat_max_scroll);
    }

    let title = if app.follow_latest {
        " Conversation "
    } else {
        " Conversation (End to jump to latest) "
    };

    let chat = chat
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Counter turns red in the last tenth of the allowed length
fn counter_style(count: usize, max: usize) -> Style {
    if count * 10 > max * 9 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let draft = &app.session.draft;
    let pending = app.is_pending();

    let (border_color, title) = if pending {
        (Color::DarkGray, " Waiting for the answer... ")
    } else {
        (Color::Yellow, " Ask (Enter to send) ")
    };

    let counter = Line::from(Span::styled(
        format!(" {}/{} ", draft.char_count(), draft.max_chars()),
        counter_style(draft.char_count(), draft.max_chars()),
    ))
    .right_aligned();

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title_bottom(counter);

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_window(draft.text(), draft.cursor(), inner_width);

    let text_style = if pending {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let input = Paragraph::new(visible_text)
        .style(text_style)
        .block(input_block);

    frame.render_widget(input, area);

    if !pending {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Horizontal scroll for the single-line input. Picks the slice of `text`
/// that fits in `width` terminal columns with the cell under the cursor
/// visible, and returns it with the cursor's column inside that slice.
fn input_window(text: &str, cursor: usize, width: usize) -> (String, u16) {
    let widths: Vec<usize> = text.chars().map(|c| c.width().unwrap_or(0)).collect();
    let cursor = cursor.min(widths.len());
    if width == 0 {
        return (String::new(), 0);
    }

    // Wide characters need both of their cells on screen
    let cursor_cell = widths.get(cursor).copied().unwrap_or(1).max(1);
    let mut start = cursor;
    let mut before = 0;
    while start > 0 && before + widths[start - 1] + cursor_cell <= width {
        start -= 1;
        before += widths[start];
    }

    let mut used = 0;
    let visible: String = text
        .chars()
        .zip(&widths)
        .skip(start)
        .take_while(|&(_, w)| {
            used += *w;
            used <= width
        })
        .map(|(c, _)| c)
        .collect();

    (visible, before as u16)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.is_pending() {
        vec![Span::styled(" WAIT ", Style::default().bg(Color::Yellow).fg(Color::Black))]
    } else {
        vec![
            Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
        ]
    };
    hints.extend(vec![
        Span::styled(" Up/Down ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" page ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
