use std::sync::Arc;
use std::time::Duration;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::debug;

use gempop_core::mode::{language_index, DEFAULT_LANGUAGE};
use gempop_core::{
    acquire_location, execute, ChatController, ChatRole, Config, DraftStore, Gateway, GroundingSource,
    LocationProvider, Mode, ModeController, ModeRequest, Tone, LANGUAGES,
};

use crate::tui::{AppEvent, EventSender};

pub const DEMO_TEXT: &str = "Google Gemini is a multimodal AI model developed by Google. It is designed to understand, operate on, and combine different types of information, including text, code, audio, image, and video. Gemini comes in different sizes: Ultra, Pro, Flash, and Nano, catering to various computational needs from data centers to mobile devices. It represents a significant leap forward in AI capabilities, demonstrating state-of-the-art performance on many leading benchmarks. The model is integrated into various Google products, including Search, Workspace, and Android.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Editable text with a cursor counted in characters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(byte_pos);
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.text.chars().count() {
            return false;
        }
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(byte_pos);
        true
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Row and column of the cursor, for multiline rendering
    pub fn cursor_row_col(&self) -> (usize, usize) {
        let mut row = 0;
        let mut col = 0;
        for c in self.text.chars().take(self.cursor) {
            if c == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (row, col)
    }
}

pub struct ChatView {
    pub controller: ChatController,
    pub input: TextInput,
    pub scroll: u16,
    /// Stick to the newest content until the user scrolls away
    pub follow: bool,
}

pub struct ModeView {
    pub controller: ModeController,
    pub input: TextInput,
    pub scroll: u16,
    pub sources: ListState,
}

impl ModeView {
    fn new(mode: Mode, drafts: &dyn DraftStore) -> Self {
        let draft = mode.draft_key().map(|key| drafts.get(key)).unwrap_or_default();
        Self {
            controller: ModeController::new(mode),
            input: TextInput::new(&draft),
            scroll: 0,
            sources: ListState::default(),
        }
    }

    pub fn sources(&self) -> &[GroundingSource] {
        self.controller.output().map(|o| o.sources()).unwrap_or(&[])
    }

    pub fn selected_source(&self) -> Option<&GroundingSource> {
        self.sources.selected().and_then(|i| self.sources().get(i))
    }
}

pub struct App {
    pub should_quit: bool,
    pub mode: Mode,
    pub input_mode: InputMode,

    // One view per mode, alive for the whole process
    pub chat: ChatView,
    pub search: ModeView,
    pub find: ModeView,
    pub translate: ModeView,
    pub summarize: ModeView,
    pub write: ModeView,

    pub language_idx: usize,
    pub tone: Tone,
    pub use_location: bool,

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub flash: Option<String>,

    // Layout info for mouse hit-testing and scrolling
    pub body_area: Option<Rect>,

    gateway: Arc<dyn Gateway>,
    locator: Arc<dyn LocationProvider>,
    geolocation_timeout: Duration,
    drafts: Arc<dyn DraftStore>,
    events: EventSender,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    pub fn new(
        config: &Config,
        gateway: Arc<dyn Gateway>,
        locator: Arc<dyn LocationProvider>,
        drafts: Arc<dyn DraftStore>,
        events: EventSender,
    ) -> Self {
        let language_idx = config
            .default_language
            .as_deref()
            .and_then(language_index)
            .or_else(|| language_index(DEFAULT_LANGUAGE))
            .unwrap_or(0);
        let tone = config
            .default_tone
            .as_deref()
            .and_then(Tone::from_str)
            .unwrap_or_default();

        Self {
            should_quit: false,
            mode: Mode::Chat,
            input_mode: InputMode::Normal,
            chat: ChatView {
                controller: ChatController::new(gateway.as_ref()),
                input: TextInput::default(),
                scroll: 0,
                follow: true,
            },
            search: ModeView::new(Mode::Search, drafts.as_ref()),
            find: ModeView::new(Mode::Find, drafts.as_ref()),
            translate: ModeView::new(Mode::Translate, drafts.as_ref()),
            summarize: ModeView::new(Mode::Summarize, drafts.as_ref()),
            write: ModeView::new(Mode::Write, drafts.as_ref()),
            language_idx,
            tone,
            use_location: true,
            animation_frame: 0,
            flash: None,
            body_area: None,
            gateway,
            locator,
            geolocation_timeout: config.geolocation_timeout(),
            drafts,
            events,
            tasks: Vec::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.gateway.model_name()
    }

    pub fn language(&self) -> &'static str {
        LANGUAGES[self.language_idx % LANGUAGES.len()]
    }

    pub fn view(&self, mode: Mode) -> Option<&ModeView> {
        match mode {
            Mode::Chat => None,
            Mode::Search => Some(&self.search),
            Mode::Find => Some(&self.find),
            Mode::Translate => Some(&self.translate),
            Mode::Summarize => Some(&self.summarize),
            Mode::Write => Some(&self.write),
        }
    }

    pub fn view_mut(&mut self, mode: Mode) -> Option<&mut ModeView> {
        match mode {
            Mode::Chat => None,
            Mode::Search => Some(&mut self.search),
            Mode::Find => Some(&mut self.find),
            Mode::Translate => Some(&mut self.translate),
            Mode::Summarize => Some(&mut self.summarize),
            Mode::Write => Some(&mut self.write),
        }
    }

    pub fn active_input(&self) -> &TextInput {
        match self.view(self.mode) {
            Some(view) => &view.input,
            None => &self.chat.input,
        }
    }

    pub fn active_input_mut(&mut self) -> &mut TextInput {
        match self.mode {
            Mode::Chat => &mut self.chat.input,
            Mode::Search => &mut self.search.input,
            Mode::Find => &mut self.find.input,
            Mode::Translate => &mut self.translate.input,
            Mode::Summarize => &mut self.summarize.input,
            Mode::Write => &mut self.write.input,
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.mode = mode;
            self.input_mode = InputMode::Normal;
            self.flash = None;
        }
    }

    pub fn is_loading(&self, mode: Mode) -> bool {
        match self.view(mode) {
            Some(view) => view.controller.is_loading(),
            None => self.chat.controller.is_loading(),
        }
    }

    fn any_loading(&self) -> bool {
        Mode::all().into_iter().any(|m| self.is_loading(m))
    }

    /// Persist the active input if its mode keeps drafts
    pub fn save_draft(&self) {
        if let Some(key) = self.mode.draft_key() {
            self.drafts.set(key, self.active_input().text());
        }
    }

    pub fn submit(&mut self) {
        match self.mode {
            Mode::Chat => self.submit_chat(),
            mode => self.submit_mode(mode),
        }
    }

    fn submit_chat(&mut self) {
        let text = self.chat.input.text().to_string();
        let Some(turn) = self.chat.controller.begin(&text) else {
            return;
        };
        self.chat.input.clear();
        self.chat.follow = true;

        let gateway = self.gateway.clone();
        let tx = self.events.clone();
        let id = turn.reply_id;

        self.spawn(async move {
            let updates = tx.clone();
            let result = turn
                .run(gateway.as_ref(), move |update| {
                    let _ = updates.send(AppEvent::ChatUpdate { id, update });
                })
                .await;
            let _ = tx.send(AppEvent::ChatFinished {
                id,
                result: result.map(|_| ()),
            });
        });
    }

    fn submit_mode(&mut self, mode: Mode) {
        let language = self.language().to_string();
        let tone = self.tone;
        let locate = self.use_location;

        let Some(view) = self.view_mut(mode) else {
            return;
        };
        let text = view.input.text().to_string();
        if !view.controller.begin(&text) {
            return;
        }
        view.scroll = 0;
        view.sources.select(None);

        let mut request = match mode {
            Mode::Search => ModeRequest::Search { query: text },
            Mode::Find => ModeRequest::Find { query: text, location: None },
            Mode::Translate => ModeRequest::Translate { text, language },
            Mode::Summarize => ModeRequest::Summarize { text },
            Mode::Write => ModeRequest::Rewrite { text, tone },
            Mode::Chat => return,
        };

        let gateway = self.gateway.clone();
        let locator = self.locator.clone();
        let geolocation_timeout = self.geolocation_timeout;
        let tx = self.events.clone();

        self.spawn(async move {
            if let ModeRequest::Find { location, .. } = &mut request {
                if locate {
                    *location = acquire_location(locator.as_ref(), geolocation_timeout).await;
                }
            }
            let result = execute(gateway.as_ref(), &request).await;
            let _ = tx.send(AppEvent::ModeFinished { mode, result });
        });
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|handle| !handle.is_finished());
        self.tasks.push(tokio::spawn(task));
    }

    /// Number of background requests still running
    pub fn pending_tasks(&self) -> usize {
        self.tasks.iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Abort everything still in flight
    pub fn shutdown(&mut self) {
        debug!(pending = self.pending_tasks(), "Aborting background tasks");
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
    }

    /// Apply a result from a background task
    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ChatUpdate { id, update } => {
                self.chat.controller.apply(id, &update);
            }
            AppEvent::ChatFinished { id, result } => {
                self.chat.controller.finish(id, result);
            }
            AppEvent::ModeFinished { mode, result } => {
                if let Some(view) = self.view_mut(mode) {
                    view.controller.complete(result);
                    let first = if view.sources().is_empty() { None } else { Some(0) };
                    view.sources.select(first);
                }
            }
            _ => {}
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.any_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Text the copy action puts on the clipboard
    pub fn copyable_output(&self) -> Option<String> {
        let text = match self.view(self.mode) {
            Some(view) => view
                .controller
                .output()
                .map(|output| output.text().to_string()),
            None => self
                .chat
                .controller
                .transcript()
                .messages()
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::Model && !m.text.is_empty())
                .map(|m| m.text.clone()),
        };
        text.filter(|text| !text.is_empty())
    }

    pub fn paste_demo(&mut self) -> bool {
        if self.mode != Mode::Summarize || !self.summarize.input.is_empty() {
            return false;
        }
        self.summarize.input.set(DEMO_TEXT);
        self.save_draft();
        true
    }

    pub fn cycle_option(&mut self, forward: bool) {
        match self.mode {
            Mode::Translate => {
                let len = LANGUAGES.len();
                self.language_idx = if forward {
                    (self.language_idx + 1) % len
                } else {
                    (self.language_idx + len - 1) % len
                };
            }
            Mode::Write => {
                self.tone = if forward { self.tone.next() } else { self.tone.prev() };
            }
            _ => {}
        }
    }

    pub fn toggle_location(&mut self) {
        if self.mode == Mode::Find {
            self.use_location = !self.use_location;
        }
    }

    pub fn source_down(&mut self) {
        if let Some(view) = self.view_mut(self.mode) {
            let len = view.sources().len();
            if len == 0 {
                return;
            }
            let next = view.sources.selected().map(|i| (i + 1).min(len - 1)).unwrap_or(0);
            view.sources.select(Some(next));
        }
    }

    pub fn source_up(&mut self) {
        if let Some(view) = self.view_mut(self.mode) {
            if view.sources().is_empty() {
                return;
            }
            let prev = view.sources.selected().map(|i| i.saturating_sub(1)).unwrap_or(0);
            view.sources.select(Some(prev));
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        match self.view_mut(self.mode) {
            Some(view) => view.scroll = view.scroll.saturating_add(lines),
            None => {
                self.chat.scroll = self.chat.scroll.saturating_add(lines);
                // the renderer re-enables follow once the bottom is reached
            }
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.view_mut(self.mode) {
            Some(view) => view.scroll = view.scroll.saturating_sub(lines),
            None => {
                self.chat.scroll = self.chat.scroll.saturating_sub(lines);
                self.chat.follow = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_input_unicode_editing() {
        let mut input = TextInput::new("días");
        assert_eq!(input.cursor(), 4);
        input.left();
        input.backspace();
        assert_eq!(input.text(), "dís");
        input.home();
        input.insert('¡');
        assert_eq!(input.text(), "¡dís");
        input.end();
        assert!(!input.delete());
        assert!(input.backspace());
        assert_eq!(input.text(), "¡dí");
    }

    #[test]
    fn test_cursor_row_col() {
        let mut input = TextInput::new("Dear team,\nThanks");
        assert_eq!(input.cursor_row_col(), (1, 6));
        input.home();
        assert_eq!(input.cursor_row_col(), (0, 0));
        input.insert('\n');
        assert_eq!(input.cursor_row_col(), (1, 0));
    }
}
