//! Classification of review-server error text.
//!
//! The server reports failures as free text on stderr (`fatal: ...`). Which
//! messages mean "already there" is data: a table of regular expressions and
//! the [`Classification`] each one maps to. Text that matches nothing is
//! [`Classification::Fatal`].

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::shell::CommandOutput;

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// The target already exists in the expected way; treat as success.
    Conflict,
    /// The server or channel was momentarily unavailable. Still escalated,
    /// nothing is retried, but reported distinctly.
    Transient,
    /// Anything else.
    Fatal,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Conflict => write!(f, "conflict"),
            Classification::Transient => write!(f, "transient"),
            Classification::Fatal => write!(f, "fatal"),
        }
    }
}

/// One entry of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct ErrorPattern {
    pub pattern: &'static str,
    pub class: Classification,
}

/// Built-in table. Matched against the trimmed stderr text, first hit wins.
pub const STANDARD_PATTERNS: &[ErrorPattern] = &[
    ErrorPattern {
        pattern: r"^fatal: Name Already Used$",
        class: Classification::Conflict,
    },
    ErrorPattern {
        pattern: r"(?i)already exists",
        class: Classification::Conflict,
    },
    ErrorPattern {
        pattern: r#"(?i)^fatal: project\s+"?\S+"?\s+exists"#,
        class: Classification::Conflict,
    },
    ErrorPattern {
        pattern: r"(?i)connection (reset|refused|closed)",
        class: Classification::Transient,
    },
    ErrorPattern {
        pattern: r"(?i)too many concurrent",
        class: Classification::Transient,
    },
    ErrorPattern {
        pattern: r"(?i)timed out",
        class: Classification::Transient,
    },
];

/// Result of classifying one command's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    Success,
    Failed {
        class: Classification,
        message: String,
    },
}

/// Compiled classification table.
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<(Regex, Classification)>,
}

impl Classifier {
    pub fn new(table: &[ErrorPattern]) -> Result<Self, regex::Error> {
        let patterns = table
            .iter()
            .map(|p| Regex::new(p.pattern).map(|re| (re, p.class)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The classifier built from [`STANDARD_PATTERNS`], compiled once.
    pub fn standard() -> &'static Classifier {
        static STANDARD: OnceLock<Classifier> = OnceLock::new();
        STANDARD.get_or_init(|| {
            Classifier::new(STANDARD_PATTERNS).expect("built-in error patterns are valid regexes")
        })
    }

    /// Classify a raw error message.
    pub fn classify_text(&self, text: &str) -> Classification {
        let text = text.trim();
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, class)| *class)
            .unwrap_or(Classification::Fatal)
    }

    /// Classify a command's output.
    ///
    /// Empty stderr is success. Stderr that does not look like an error report
    /// (`fatal...` / `error...`) is a warning: logged, still success.
    pub fn classify(&self, output: &CommandOutput) -> RemoteOutcome {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            return RemoteOutcome::Success;
        }
        let lower = stderr.to_ascii_lowercase();
        if !(lower.starts_with("fatal") || lower.starts_with("error")) {
            tracing::warn!("remote warning: {stderr}");
            return RemoteOutcome::Success;
        }
        RemoteOutcome::Failed {
            class: self.classify_text(stderr),
            message: stderr.to_owned(),
        }
    }
}

/// Classify with the standard table.
pub fn classify(text: &str) -> Classification {
    Classifier::standard().classify_text(text)
}
