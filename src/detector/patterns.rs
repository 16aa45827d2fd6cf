//! Error pattern definitions and the process-wide pattern set.
//!
//! Patterns are loaded once (from the built-in document or a user file) and
//! are read-only afterwards, so every concurrent execution shares them
//! without locking.

use crate::error::{ExecError, Result};
use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Default similarity threshold for fuzzy patterns.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

const BUILTIN_PATTERNS: &str = include_str!("default_patterns.toml");

static PATTERNS: OnceCell<PatternSet> = OnceCell::new();

/// Pattern kind, also the evaluation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Fuzzy,
    Exact,
    Regex,
}

/// A single classification rule.
#[derive(Debug, Clone)]
pub enum ErrorPattern {
    /// Word-window similarity against `needle`, case-insensitive.
    Fuzzy {
        category: String,
        needle: String,
        threshold: f64,
    },
    /// Case-sensitive substring.
    Exact { category: String, needle: String },
    /// Case-insensitive regex search.
    Regex {
        category: String,
        pattern: String,
        regex: Regex,
    },
}

impl ErrorPattern {
    /// Creates an exact (substring) pattern.
    pub fn exact(category: impl Into<String>, needle: impl Into<String>) -> Result<Self> {
        let needle = needle.into();
        if needle.is_empty() {
            return Err(ExecError::config("exact pattern needle must not be empty"));
        }
        Ok(Self::Exact {
            category: category.into(),
            needle,
        })
    }

    /// Creates a case-insensitive regex pattern.
    pub fn regex(category: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ExecError::config(format!("Invalid regex pattern '{pattern}': {e}")))?;
        Ok(Self::Regex {
            category: category.into(),
            pattern,
            regex,
        })
    }

    /// Creates a fuzzy pattern; `threshold` must be in `(0, 1]`.
    pub fn fuzzy(
        category: impl Into<String>,
        needle: impl Into<String>,
        threshold: f64,
    ) -> Result<Self> {
        let needle = words(&needle.into()).join(" ");
        if needle.is_empty() {
            return Err(ExecError::config("fuzzy pattern needle must contain a word"));
        }
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ExecError::config(format!(
                "fuzzy threshold must be in (0, 1], got {threshold}"
            )));
        }
        Ok(Self::Fuzzy {
            category: category.into(),
            needle,
            threshold,
        })
    }

    pub fn category(&self) -> &str {
        match self {
            Self::Fuzzy { category, .. }
            | Self::Exact { category, .. }
            | Self::Regex { category, .. } => category,
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            Self::Fuzzy { .. } => PatternKind::Fuzzy,
            Self::Exact { .. } => PatternKind::Exact,
            Self::Regex { .. } => PatternKind::Regex,
        }
    }

    /// Returns the needle or regex source.
    pub fn value(&self) -> &str {
        match self {
            Self::Fuzzy { needle, .. } | Self::Exact { needle, .. } => needle,
            Self::Regex { pattern, .. } => pattern,
        }
    }

    /// Returns true if `text` matches this pattern.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact { needle, .. } => text.contains(needle.as_str()),
            Self::Regex { regex, .. } => regex.is_match(text),
            Self::Fuzzy {
                needle, threshold, ..
            } => fuzzy_matches(needle, *threshold, text),
        }
    }
}

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Slides a window of the needle's word count over `text` and compares each
/// window with the needle by normalized Levenshtein similarity.
///
/// Windows are word-aligned, so a short needle never matches the inside of
/// an unrelated longer word. A window is only joined into a string once its
/// length could reach the threshold.
fn fuzzy_matches(needle: &str, threshold: f64, text: &str) -> bool {
    let width = needle.split(' ').count();
    let haystack = words(text);
    if haystack.len() < width {
        return false;
    }

    let needle_len = needle.chars().count() as f64;
    let lens: Vec<usize> = haystack.iter().map(|w| w.chars().count()).collect();
    let mut window_len: usize = lens[..width].iter().sum::<usize>() + width - 1;

    for start in 0..=haystack.len() - width {
        if start > 0 {
            window_len = window_len - lens[start - 1] + lens[start + width - 1];
        }
        let candidate_len = window_len as f64;
        if candidate_len.min(needle_len) / candidate_len.max(needle_len) < threshold {
            continue;
        }
        let candidate = haystack[start..start + width].join(" ");
        if strsim::normalized_levenshtein(&candidate, needle) >= threshold {
            return true;
        }
    }
    false
}

#[derive(Debug, Deserialize)]
struct PatternEntry {
    category: String,
    kind: PatternKind,
    value: String,
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PatternDocument {
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

/// Ordered, tiered collection of error patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    exact: Vec<ErrorPattern>,
    regex: Vec<ErrorPattern>,
    fuzzy: Vec<ErrorPattern>,
}

impl PatternSet {
    /// Creates an empty pattern set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from patterns in registration order.
    pub fn from_patterns(patterns: impl IntoIterator<Item = ErrorPattern>) -> Self {
        let mut set = Self::new();
        for pattern in patterns {
            set.push(pattern);
        }
        set
    }

    /// Appends a pattern to the end of its tier.
    pub fn push(&mut self, pattern: ErrorPattern) {
        match pattern.kind() {
            PatternKind::Exact => self.exact.push(pattern),
            PatternKind::Regex => self.regex.push(pattern),
            PatternKind::Fuzzy => self.fuzzy.push(pattern),
        }
    }

    /// Parses a TOML pattern document (`[[patterns]]` entries with
    /// `category`, `kind`, `value` and optional `threshold`).
    pub fn from_toml(content: &str) -> Result<Self> {
        let doc: PatternDocument = toml::from_str(content)
            .map_err(|e| ExecError::config(format!("Invalid error pattern document: {e}")))?;

        let mut set = Self::new();
        for entry in doc.patterns {
            let pattern = match entry.kind {
                PatternKind::Exact => ErrorPattern::exact(entry.category, entry.value)?,
                PatternKind::Regex => ErrorPattern::regex(entry.category, entry.value)?,
                PatternKind::Fuzzy => ErrorPattern::fuzzy(
                    entry.category,
                    entry.value,
                    entry.threshold.unwrap_or(DEFAULT_FUZZY_THRESHOLD),
                )?,
            };
            set.push(pattern);
        }
        Ok(set)
    }

    /// Loads a pattern document from disk.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExecError::config(format!(
                "Failed to read error patterns from {}: {e}",
                path.display()
            ))
        })?;
        let set = Self::from_toml(&content)?;
        debug!("Loaded {} error patterns from {}", set.len(), path.display());
        Ok(set)
    }

    /// The pattern set compiled into the crate.
    pub fn builtin() -> Self {
        Self::from_toml(BUILTIN_PATTERNS).unwrap_or_else(|e| {
            warn!("Built-in error patterns failed to load: {e}");
            Self::new()
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.regex.len() + self.fuzzy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates patterns in evaluation order: exact, regex, then fuzzy,
    /// each tier in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorPattern> {
        self.exact
            .iter()
            .chain(self.regex.iter())
            .chain(self.fuzzy.iter())
    }
}

/// Installs the process-wide pattern set. Call once at startup, before any
/// query runs; a second call fails.
pub fn init_patterns(set: PatternSet) -> Result<()> {
    PATTERNS
        .set(set)
        .map_err(|_| ExecError::internal("Error patterns are already initialized"))
}

/// Read-only handle to the process-wide pattern set, falling back to the
/// built-in set if nothing was installed.
pub fn patterns() -> &'static PatternSet {
    PATTERNS.get_or_init(PatternSet::builtin)
}
