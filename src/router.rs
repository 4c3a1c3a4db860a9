use std::fmt;

/// Remote operation a command is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Summarize,
    Transform,
    Prompt,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Summarize => "/summarize",
            Route::Transform => "/api/v1/transform",
            Route::Prompt => "/prompt",
        }
    }

    /// Engine name used when the backend does not report its own.
    pub fn engine(self) -> &'static str {
        match self {
            Route::Summarize => "summarizer",
            Route::Transform => "style-transformer",
            Route::Prompt => "prompt-agent",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Summarize => "summarize",
            Route::Transform => "transform",
            Route::Prompt => "prompt",
        };
        f.write_str(name)
    }
}

const SUMMARY_KEYWORDS: &[&str] = &["summarize", "summary"];

const STYLE_KEYWORDS: &[&str] = &[
    "formal",
    "professional",
    "business",
    "official",
    "simplify",
    "simple",
    "easier",
    "beginner",
    "layman",
    "tone",
    "casual",
    "friendly",
    "warm",
    "conversational",
    "confident",
];

/// Evaluated top to bottom, first match wins. Anything unmatched goes to
/// [`Route::Prompt`].
const ROUTES: &[(Route, &[&str])] = &[
    (Route::Summarize, SUMMARY_KEYWORDS),
    (Route::Transform, STYLE_KEYWORDS),
];

pub fn route_for(command: &str) -> Route {
    let lower = command.to_lowercase();
    ROUTES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(route, _)| *route)
        .unwrap_or(Route::Prompt)
}
