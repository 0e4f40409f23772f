use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Answer(outcome) => app.apply_answer(outcome),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Keys that work whether or not a request is in flight
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::Up => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_down(1);
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.page_size());
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.page_size());
            return;
        }
        KeyCode::End if ctrl || app.session.draft.text().is_empty() => {
            app.scroll_to_latest();
            return;
        }
        _ => {}
    }

    // The input is disabled while waiting for an answer
    if app.is_pending() {
        return;
    }

    match key.code {
        KeyCode::Enter if !key.modifiers.contains(KeyModifiers::SHIFT) => {
            app.send();
        }
        KeyCode::Backspace => app.session.draft.backspace(),
        KeyCode::Delete => app.session.draft.delete(),
        KeyCode::Left => app.session.draft.move_left(),
        KeyCode::Right => app.session.draft.move_right(),
        KeyCode::Home => app.session.draft.move_home(),
        KeyCode::End => app.session.draft.move_end(),
        KeyCode::Char(c) if !ctrl => {
            app.session.draft.insert(c);
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.is_pending() {
        return;
    }
    let taken = app.session.draft.insert_str(text);
    if taken < text.chars().count() {
        tracing::debug!(taken, "paste truncated at the input limit");
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        _ => {}
    }
}
