//! Response extractor - turns a raw model completion into one short display line.
//!
//! Reasoning models wrap their chain of thought in delimiter tags and are told
//! to prefix the real answer with a marker. This module strips the reasoning,
//! picks the answer line, and guarantees a non-empty result for any input.

use regex::Regex;
use serde::Deserialize;

/// Fallback reply when nothing usable survives extraction.
pub const DEFAULT_PLACEHOLDER: &str = "Ошибока твин.";

/// How to pick the answer when no marker is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Last surviving non-empty line.
    LastLine,
    /// Shortest sentence of the surviving text (first on ties).
    ShortestSentence,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Opening reasoning delimiter.
    pub open_tag: String,
    /// Closing reasoning delimiter.
    pub close_tag: String,
    /// The model is instructed to prefix its answer with this token.
    pub answer_marker: String,
    /// Lines starting with one of these (case-insensitive) are meta-commentary.
    pub meta_prefixes: Vec<String>,
    pub fallback: Fallback,
    /// Max display length in chars. Telegram caps messages at 4096.
    pub max_len: Option<usize>,
    pub placeholder: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            open_tag: "<think>".to_string(),
            close_tag: "</think>".to_string(),
            answer_marker: "ANSWER:".to_string(),
            meta_prefixes: vec![
                "note:".to_string(),
                "примечание:".to_string(),
                "as an ai".to_string(),
                "вот ответ".to_string(),
                "here is".to_string(),
            ],
            fallback: Fallback::LastLine,
            max_len: Some(4096),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

pub struct Extractor {
    config: ExtractorConfig,
    span_re: Regex,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        // Tags are escaped literals, the pattern is always valid.
        let span_re = Regex::new(&format!(
            "(?s){}.*?{}",
            regex::escape(&config.open_tag),
            regex::escape(&config.close_tag)
        ))
        .expect("escaped literals form a valid pattern");

        Self { config, span_re }
    }

    /// Extract the display line from a raw completion.
    ///
    /// Total and deterministic: terminates for any input and never returns an
    /// empty string or a string containing a delimiter tag.
    pub fn extract(&self, raw: &str) -> String {
        let text = raw.replace("\r\n", "\n").replace('\r', "\n");

        // Drop every complete reasoning span first.
        let mut text = self.span_re.replace_all(&text, "").into_owned();

        // An unclosed open tag means everything after it is unreliable.
        if let Some(pos) = text.find(&self.config.open_tag) {
            text.truncate(pos);
        }

        // Stray close tags (reasoning that started before this completion).
        let text = text.replace(&self.config.close_tag, "");

        if let Some(answer) = self.marker_answer(&text) {
            return self.finish(&answer);
        }

        match self.heuristic_answer(&text) {
            Some(answer) => self.finish(&answer),
            None => self.config.placeholder.clone(),
        }
    }

    /// Text after the answer marker, last occurrence wins.
    fn marker_answer(&self, text: &str) -> Option<String> {
        let marker = &self.config.answer_marker;
        if marker.is_empty() {
            return None;
        }

        let mut answer = None;
        for line in text.lines() {
            if let Some(idx) = line.rfind(marker.as_str()) {
                answer = Some(line[idx + marker.len()..].trim().to_string());
            }
        }
        answer
    }

    fn heuristic_answer(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !self.is_meta(line))
            .collect();

        match self.config.fallback {
            Fallback::LastLine => lines.last().map(|line| line.to_string()),
            Fallback::ShortestSentence => lines
                .join("\n")
                .split(['.', '!', '?', '…'])
                .map(str::trim)
                .filter(|sentence| !sentence.is_empty())
                .min_by_key(|sentence| sentence.chars().count())
                .map(|sentence| sentence.to_string()),
        }
    }

    fn is_meta(&self, line: &str) -> bool {
        if line.starts_with('(') && line.ends_with(')') {
            return true;
        }
        let lower = line.to_lowercase();
        self.config
            .meta_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }

    /// Trim, clamp to the display length, fall back to the placeholder.
    fn finish(&self, answer: &str) -> String {
        let answer = answer.trim();
        let answer = match self.config.max_len {
            Some(max) => truncate_display(answer, max),
            None => answer.to_string(),
        };
        if answer.is_empty() {
            self.config.placeholder.clone()
        } else {
            answer
        }
    }
}

/// Truncate to `max_chars`, preferring to cut just after a sentence end.
fn truncate_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(['.', '!', '?']) {
        Some(idx) if idx > 0 => cut[..=idx].trim_end().to_string(),
        _ => cut.trim_end().to_string(),
    }
}
