use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::{debug, warn};

use gempop_core::Mode;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        other => app.apply_event(other),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Mode switching
        KeyCode::Tab => app.set_mode(app.mode.next()),
        KeyCode::BackTab => app.set_mode(app.mode.prev()),
        KeyCode::Char(c @ '1'..='6') => {
            let idx = c as usize - '1' as usize;
            app.set_mode(Mode::all()[idx]);
        }

        // Start typing
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.flash = None;
        }

        // Sources when there are any, otherwise scroll
        KeyCode::Char('j') => {
            if has_sources(app) {
                app.source_down();
            } else {
                app.scroll_down(1);
            }
        }
        KeyCode::Char('k') => {
            if has_sources(app) {
                app.source_up();
            } else {
                app.scroll_up(1);
            }
        }
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::PageUp => app.scroll_up(10),

        KeyCode::Char('o') => open_selected_source(app),
        KeyCode::Char('c') => copy_output(app),

        // Mode options
        KeyCode::Char('[') => app.cycle_option(false),
        KeyCode::Char(']') => app.cycle_option(true),
        KeyCode::Char('l') => app.toggle_location(),
        KeyCode::Char('p') => {
            if app.paste_demo() {
                app.flash = Some("Demo text pasted".to_string());
            }
        }

        _ => {}
    }
}

fn has_sources(app: &App) -> bool {
    app.view(app.mode).is_some_and(|view| !view.sources().is_empty())
}

/// Translate, summarize and write take free-form text; Enter is a newline there
fn is_multiline(mode: Mode) -> bool {
    matches!(mode, Mode::Translate | Mode::Summarize | Mode::Write)
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let mut edited = false;

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Char('s') if ctrl => {
            app.submit();
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter if is_multiline(app.mode) => {
            app.active_input_mut().insert('\n');
            edited = true;
        }
        KeyCode::Enter => {
            app.submit();
            // chat keeps the cursor in the input for the next message
            if app.mode != Mode::Chat {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            edited = app.active_input_mut().backspace();
        }
        KeyCode::Delete => {
            edited = app.active_input_mut().delete();
        }
        KeyCode::Left => app.active_input_mut().left(),
        KeyCode::Right => app.active_input_mut().right(),
        KeyCode::Home => app.active_input_mut().home(),
        KeyCode::End => app.active_input_mut().end(),
        KeyCode::Char(c) if !ctrl => {
            app.active_input_mut().insert(c);
            edited = true;
        }
        _ => {}
    }

    if edited {
        app.save_draft();
    }
}

fn open_selected_source(app: &mut App) {
    let Some(source) = app.view(app.mode).and_then(|view| view.selected_source()) else {
        return;
    };
    let uri = source.uri.clone();

    debug!(uri = %uri, "Opening source");
    if let Err(e) = open::that(&uri) {
        warn!(error = %e, "Could not open browser");
        app.flash = Some("Could not open link".to_string());
    }
}

fn copy_output(app: &mut App) {
    let Some(text) = app.copyable_output() else {
        app.flash = Some("Nothing to copy yet".to_string());
        return;
    };

    app.flash = Some(if copy_to_clipboard(&text) {
        "Copied to clipboard".to_string()
    } else {
        "Clipboard unavailable".to_string()
    });
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_body = app
        .body_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_body {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

/// Pipe text into the first clipboard tool that exists on this system
fn copy_to_clipboard(text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    const TOOLS: [(&str, &[&str]); 4] = [
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("clip", &[]),
    ];

    for (program, args) in TOOLS {
        let Ok(mut child) = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
        else {
            continue;
        };

        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()).is_ok(),
            None => false,
        };
        // stdin is dropped above so the tool sees EOF
        if written && child.wait().map(|s| s.success()).unwrap_or(false) {
            return true;
        }
    }

    warn!("No clipboard tool found");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use gempop_core::geo::FixedLocation;
    use gempop_core::gateway::Generation;
    use gempop_core::grounding::{CitationChunk, CitationLink};
    use gempop_core::testing::ScriptedGateway;
    use gempop_core::{Config, DraftStore, GatewayError, LatLng, MemoryDraftStore, RequestStatus};
    use tokio::sync::mpsc;

    const HERE: LatLng = LatLng { lat: 40.71, lng: -74.0 };

    struct Harness {
        app: App,
        rx: mpsc::UnboundedReceiver<AppEvent>,
        gateway: Arc<ScriptedGateway>,
        drafts: Arc<MemoryDraftStore>,
    }

    fn harness() -> Harness {
        harness_with_drafts(Arc::new(MemoryDraftStore::new()))
    }

    fn harness_with_drafts(drafts: Arc<MemoryDraftStore>) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(ScriptedGateway::new());
        let app = App::new(
            &Config::new(),
            gateway.clone(),
            Arc::new(FixedLocation(HERE)),
            drafts.clone(),
            tx,
        );
        Harness { app, rx, gateway, drafts }
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            let code = if c == '\n' { KeyCode::Enter } else { KeyCode::Char(c) };
            handle_event(app, key(code));
        }
    }

    /// Feed background events back in until a request settles. Returns what
    /// the last model message showed after each chat update.
    async fn settle(h: &mut Harness) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), h.rx.recv())
                .await
                .expect("background task never reported")
                .expect("event channel closed");
            let done = matches!(
                event,
                AppEvent::ChatFinished { .. } | AppEvent::ModeFinished { .. }
            );
            let is_update = matches!(event, AppEvent::ChatUpdate { .. });
            handle_event(&mut h.app, event);
            if is_update {
                if let Some(last) = h.app.chat.controller.transcript().last() {
                    seen.push(last.text.clone());
                }
            }
            if done {
                return seen;
            }
        }
    }

    #[tokio::test]
    async fn test_chat_streams_into_transcript() {
        let mut h = harness();
        h.gateway.push_stream(vec![Ok("Hi"), Ok(" there"), Ok("!")]);

        handle_event(&mut h.app, key(KeyCode::Char('i')));
        type_text(&mut h.app, "Hello\n");
        assert!(h.app.chat.input.is_empty());
        assert!(h.app.chat.controller.is_loading());

        let seen = settle(&mut h).await;
        assert_eq!(seen, vec!["Hi", "Hi there", "Hi there!"]);

        let messages = h.app.chat.controller.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "Hello");
        assert_eq!(messages[2].text, "Hi there!");
        assert_eq!(h.app.chat.controller.status(), RequestStatus::Done);
        assert_eq!(h.app.input_mode, InputMode::Editing);
    }

    #[tokio::test]
    async fn test_switching_modes_keeps_chat_stream_alive() {
        let mut h = harness();
        h.gateway.push_stream(vec![Ok("Still "), Ok("here")]);

        handle_event(&mut h.app, key(KeyCode::Enter));
        type_text(&mut h.app, "Are you there?\n");
        handle_event(&mut h.app, key(KeyCode::Esc));
        handle_event(&mut h.app, key(KeyCode::Char('4')));
        assert_eq!(h.app.mode, Mode::Translate);

        settle(&mut h).await;
        let last = h.app.chat.controller.transcript().last().unwrap();
        assert_eq!(last.text, "Still here");
    }

    #[tokio::test]
    async fn test_search_shows_text_and_sources() {
        let mut h = harness();
        h.gateway.push_generation(Ok(Generation {
            text: Some("It is sunny.".into()),
            citations: vec![CitationChunk::Web(CitationLink::new(
                Some("WeatherSite"),
                Some("https://example.com"),
            ))],
        }));

        handle_event(&mut h.app, key(KeyCode::Char('2')));
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        type_text(&mut h.app, "weather\n");
        assert_eq!(h.app.input_mode, InputMode::Normal);
        assert!(h.app.search.controller.is_loading());

        settle(&mut h).await;
        let output = h.app.search.controller.output().unwrap();
        assert_eq!(output.text(), "It is sunny.");
        assert_eq!(h.app.search.sources().len(), 1);
        assert_eq!(
            h.app.search.selected_source().map(|s| s.title.as_str()),
            Some("WeatherSite")
        );
        assert_eq!(h.app.copyable_output().as_deref(), Some("It is sunny."));
    }

    #[tokio::test]
    async fn test_summarize_fault_shows_fixed_message() {
        let mut h = harness();
        h.gateway.push_failure(GatewayError::Service("overloaded".into()));

        handle_event(&mut h.app, key(KeyCode::Char('5')));
        handle_event(&mut h.app, key(KeyCode::Char('p')));
        assert!(!h.app.summarize.input.is_empty());
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        handle_event(&mut h.app, ctrl('s'));

        settle(&mut h).await;
        assert_eq!(h.app.summarize.controller.status(), RequestStatus::Error);
        assert_eq!(
            h.app.summarize.controller.output().map(|o| o.text()),
            Some("Failed to generate summary. Please try again.")
        );
    }

    #[tokio::test]
    async fn test_find_location_toggle() {
        let mut h = harness();
        h.gateway.push_text("Two cafes nearby.");
        h.gateway.push_text("Three cafes somewhere.");

        handle_event(&mut h.app, key(KeyCode::Char('3')));
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        type_text(&mut h.app, "coffee\n");
        settle(&mut h).await;

        handle_event(&mut h.app, key(KeyCode::Char('l')));
        assert!(!h.app.use_location);
        handle_event(&mut h.app, key(KeyCode::Enter));
        handle_event(&mut h.app, ctrl('s'));
        settle(&mut h).await;

        let calls = h.gateway.generate_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1.maps);
        assert_eq!(calls[0].1.location_bias, Some(HERE));
        assert_eq!(calls[1].1.location_bias, None);
        assert_eq!(h.app.find.controller.output().map(|o| o.text()), Some("Three cafes somewhere."));
    }

    #[tokio::test]
    async fn test_translate_uses_selected_language() {
        let mut h = harness();
        h.gateway.push_text("Bonjour.");

        handle_event(&mut h.app, key(KeyCode::Char('4')));
        handle_event(&mut h.app, key(KeyCode::Char(']')));
        assert_eq!(h.app.language(), "French");
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        type_text(&mut h.app, "Hello");
        handle_event(&mut h.app, ctrl('s'));
        settle(&mut h).await;

        assert!(h.gateway.generate_calls()[0].0.contains("into French"));
        assert_eq!(h.app.translate.controller.output().map(|o| o.text()), Some("Bonjour."));
    }

    #[test]
    fn test_blank_submit_does_nothing() {
        let mut h = harness();
        handle_event(&mut h.app, key(KeyCode::Char('6')));
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        type_text(&mut h.app, "   ");
        handle_event(&mut h.app, ctrl('s'));

        assert_eq!(h.app.write.controller.status(), RequestStatus::Idle);
        assert!(h.gateway.generate_calls().is_empty());
        assert_eq!(h.app.pending_tasks(), 0);
    }

    #[test]
    fn test_multiline_enter_inserts_newline_and_saves_draft() {
        let mut h = harness();
        handle_event(&mut h.app, key(KeyCode::Char('6')));
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        type_text(&mut h.app, "Dear team,\nThanks");

        assert_eq!(h.app.write.input.text(), "Dear team,\nThanks");
        assert_eq!(h.app.write.controller.status(), RequestStatus::Idle);
        assert_eq!(h.drafts.get("writer_input"), "Dear team,\nThanks");

        let restored = harness_with_drafts(h.drafts.clone());
        assert_eq!(restored.app.write.input.text(), "Dear team,\nThanks");
        assert!(restored.app.search.input.is_empty());
    }

    #[test]
    fn test_mode_keys_cycle_and_quit() {
        let mut h = harness();
        handle_event(&mut h.app, key(KeyCode::BackTab));
        assert_eq!(h.app.mode, Mode::Write);
        handle_event(&mut h.app, key(KeyCode::Tab));
        assert_eq!(h.app.mode, Mode::Chat);

        handle_event(&mut h.app, key(KeyCode::Char('6')));
        handle_event(&mut h.app, key(KeyCode::Char(']')));
        assert_eq!(h.app.tone, gempop_core::Tone::Casual);

        // q is text while editing
        handle_event(&mut h.app, key(KeyCode::Char('i')));
        handle_event(&mut h.app, key(KeyCode::Char('q')));
        assert!(!h.app.should_quit);
        handle_event(&mut h.app, key(KeyCode::Esc));
        handle_event(&mut h.app, key(KeyCode::Char('q')));
        assert!(h.app.should_quit);
    }
}
