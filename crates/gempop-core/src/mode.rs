/// The six user-facing features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Chat,
    Search,
    Find,
    Translate,
    Summarize,
    Write,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Chat => "chat",
            Mode::Search => "search",
            Mode::Find => "find",
            Mode::Translate => "translate",
            Mode::Summarize => "summarize",
            Mode::Write => "write",
        }
    }

    /// Tab order
    pub fn all() -> [Mode; 6] {
        [
            Mode::Chat,
            Mode::Search,
            Mode::Find,
            Mode::Translate,
            Mode::Summarize,
            Mode::Write,
        ]
    }

    pub fn index(&self) -> usize {
        Mode::all().iter().position(|m| m == self).unwrap_or(0)
    }

    pub fn next(&self) -> Mode {
        let all = Mode::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn prev(&self) -> Mode {
        let all = Mode::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Chat => "Chat",
            Mode::Search => "Search",
            Mode::Find => "Find",
            Mode::Translate => "Translate",
            Mode::Summarize => "Summarize",
            Mode::Write => "Write",
        }
    }

    /// Draft store key for modes whose input survives restarts
    pub fn draft_key(&self) -> Option<&'static str> {
        match self {
            Mode::Summarize => Some("summarize_input"),
            Mode::Translate => Some("translate_input"),
            Mode::Write => Some("writer_input"),
            Mode::Chat | Mode::Search | Mode::Find => None,
        }
    }

    /// Shown in place of the result when the gateway call fails
    pub fn error_message(&self) -> &'static str {
        match self {
            Mode::Chat => "Sorry, something went wrong. Please try again.",
            Mode::Search => "An error occurred while searching. Please try again.",
            Mode::Find => "An error occurred while finding places. Please try again.",
            Mode::Translate => "Translation failed. Please try again.",
            Mode::Summarize => "Failed to generate summary. Please try again.",
            Mode::Write => "Failed to rewrite text. Please try again.",
        }
    }

    /// Shown when the gateway succeeds but returns no text
    pub fn empty_message(&self) -> &'static str {
        match self {
            Mode::Chat => "",
            Mode::Search => "No results found.",
            Mode::Find => "No places found.",
            Mode::Translate => "Translation failed.",
            Mode::Summarize => "No summary generated.",
            Mode::Write => "No rewrite generated.",
        }
    }

    /// Chat keeps a transcript, every other mode holds a single result
    pub fn is_single_result(&self) -> bool {
        !matches!(self, Mode::Chat)
    }
}

/// Rewrite styles offered by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Enthusiastic,
    Concise,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "Professional",
            Tone::Casual => "Casual",
            Tone::Enthusiastic => "Enthusiastic",
            Tone::Concise => "Concise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "professional" => Some(Tone::Professional),
            "casual" => Some(Tone::Casual),
            "enthusiastic" => Some(Tone::Enthusiastic),
            "concise" => Some(Tone::Concise),
            _ => None,
        }
    }

    pub fn all() -> [Tone; 4] {
        [Tone::Professional, Tone::Casual, Tone::Enthusiastic, Tone::Concise]
    }

    pub fn next(&self) -> Tone {
        let all = Tone::all();
        let i = all.iter().position(|t| t == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }

    pub fn prev(&self) -> Tone {
        let all = Tone::all();
        let i = all.iter().position(|t| t == self).unwrap_or(0);
        all[(i + all.len() - 1) % all.len()]
    }
}

/// Translation targets, in picker order
pub const LANGUAGES: [&str; 13] = [
    "Spanish",
    "French",
    "German",
    "Italian",
    "Portuguese",
    "Chinese (Simplified)",
    "Japanese",
    "Korean",
    "Hindi",
    "Arabic",
    "Russian",
    "Dutch",
    "Turkish",
];

pub const DEFAULT_LANGUAGE: &str = "Spanish";

/// Case-insensitive lookup into [`LANGUAGES`]
pub fn language_index(name: &str) -> Option<usize> {
    LANGUAGES.iter().position(|l| l.eq_ignore_ascii_case(name.trim()))
}
