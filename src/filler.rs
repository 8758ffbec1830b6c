//! Writes answers back into a template.
//!
//! Paragraph text is split into placeholder tokens and plain text, then passed through
//! independent rewrite rules. Text produced by a rule is frozen, so an answer value can never
//! be picked up again by a later rule (e.g. an answer that happens to contain a schedule key).

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::docx::model::{Document, Paragraph};
use crate::fields::{header_labels, schedule_keys, WeekdayLocale, PLACEHOLDER_RE};

/// Everything the caller supplies to fill one template.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FillValues {
    #[serde(default)]
    pub answers: HashMap<String, String>,
    #[serde(default)]
    pub selected_checkboxes: BTreeSet<String>,
    #[serde(default)]
    pub schedule_values: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Inner text of a `<...>` token, untrimmed.
    Placeholder(String),
    /// Output of a rule; never rewritten again.
    Fixed(String),
}

pub fn segment(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut last = 0;
    for cap in PLACEHOLDER_RE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Text(text[last..whole.start()].to_string()));
        }
        out.push(Segment::Placeholder(inner.as_str().to_string()));
        last = whole.end();
    }
    if last < text.len() {
        out.push(Segment::Text(text[last..].to_string()));
    }
    out
}

pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for s in segments {
        match s {
            Segment::Text(t) | Segment::Fixed(t) => out.push_str(t),
            Segment::Placeholder(p) => {
                out.push('<');
                out.push_str(p);
                out.push('>');
            }
        }
    }
    out
}

pub trait RewriteRule {
    fn rewrite(&self, segments: Vec<Segment>) -> Vec<Segment>;
}

/// Applies `f` to every plain-text segment; `f` returns `None` when it has nothing to change.
fn rewrite_text_segments(
    segments: Vec<Segment>,
    f: impl Fn(&str) -> Option<Vec<Segment>>,
) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for s in segments {
        match s {
            Segment::Text(t) => match f(&t) {
                Some(parts) => out.extend(parts),
                None => out.push(Segment::Text(t)),
            },
            other => out.push(other),
        }
    }
    out
}

/// Like [`rewrite_text_segments`], but each maximal stretch of text and unresolved
/// placeholder segments is handed to `f` as one string, so a match may span a `<...>` token.
fn rewrite_open_spans(
    segments: Vec<Segment>,
    f: impl Fn(&str) -> Option<Vec<Segment>>,
) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    let mut open: Vec<Segment> = Vec::new();
    for s in segments {
        match s {
            Segment::Fixed(_) => {
                flush_open_span(&mut open, &mut out, &f);
                out.push(s);
            }
            other => open.push(other),
        }
    }
    flush_open_span(&mut open, &mut out, &f);
    out
}

fn flush_open_span(
    open: &mut Vec<Segment>,
    out: &mut Vec<Segment>,
    f: &impl Fn(&str) -> Option<Vec<Segment>>,
) {
    if open.is_empty() {
        return;
    }
    match f(&render(open)) {
        Some(parts) => {
            out.extend(parts);
            open.clear();
        }
        None => out.append(open),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// Replaces every occurrence of `key` that is not glued to a word character.
fn replace_bounded(text: &str, key: &str, value: &str) -> Option<Vec<Segment>> {
    if key.is_empty() {
        return None;
    }
    let mut out = Vec::new();
    let mut last = 0;
    let mut pos = 0;
    while let Some(found) = text[pos..].find(key) {
        let start = pos + found;
        let end = start + key.len();
        if bounded(text, start, end) {
            if start > last {
                out.push(Segment::Text(text[last..start].to_string()));
            }
            out.push(Segment::Fixed(value.to_string()));
            last = end;
            pos = end;
        } else {
            pos = start + key.chars().next().map_or(1, char::len_utf8);
        }
    }
    if out.is_empty() {
        return None;
    }
    if last < text.len() {
        out.push(Segment::Text(text[last..].to_string()));
    }
    Some(out)
}

pub struct PlaceholderRule<'a> {
    answers: &'a HashMap<String, String>,
}

impl RewriteRule for PlaceholderRule<'_> {
    fn rewrite(&self, segments: Vec<Segment>) -> Vec<Segment> {
        segments
            .into_iter()
            .map(|s| match s {
                Segment::Placeholder(raw) => {
                    match self
                        .answers
                        .get(&raw)
                        .or_else(|| self.answers.get(raw.trim()))
                    {
                        Some(v) => Segment::Fixed(v.clone()),
                        None => Segment::Placeholder(raw),
                    }
                }
                other => other,
            })
            .collect()
    }
}

pub struct ScheduleKeyRule<'a> {
    /// Longest keys first, so `Arbeitszeit_Montag` wins over a key `Arbeitszeit`.
    entries: Vec<(&'a str, &'a str)>,
}

impl<'a> ScheduleKeyRule<'a> {
    pub fn new(values: &'a HashMap<String, String>) -> Self {
        let mut entries: Vec<(&str, &str)> = values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self { entries }
    }
}

impl RewriteRule for ScheduleKeyRule<'_> {
    fn rewrite(&self, mut segments: Vec<Segment>) -> Vec<Segment> {
        for (key, value) in &self.entries {
            segments = rewrite_text_segments(segments, |t| replace_bounded(t, key, value));
        }
        segments
    }
}

pub struct CheckboxRule {
    options: Vec<Regex>,
}

impl CheckboxRule {
    pub fn new(selected: &BTreeSet<String>) -> Self {
        let options = selected
            .iter()
            .filter(|o| !o.trim().is_empty())
            .filter_map(|opt| {
                let pattern = format!(r"(☐|\[\s?\])(\s*{})", regex::escape(opt.trim()));
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("skipping checkbox option {opt:?}: {e}");
                        None
                    }
                }
            })
            .collect();
        Self { options }
    }

    fn tick(re: &Regex, text: &str) -> Option<Vec<Segment>> {
        let mut out = Vec::new();
        let mut last = 0;
        for cap in re.captures_iter(text) {
            let (Some(whole), Some(mark), Some(rest)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };
            if text[whole.end()..].chars().next().is_some_and(is_word_char) {
                continue;
            }
            if whole.start() > last {
                out.extend(segment(&text[last..whole.start()]));
            }
            let ticked = if mark.as_str() == "☐" { "☑" } else { "[X]" };
            out.push(Segment::Fixed(format!("{ticked}{}", rest.as_str())));
            last = whole.end();
        }
        if out.is_empty() {
            return None;
        }
        if last < text.len() {
            out.extend(segment(&text[last..]));
        }
        Some(out)
    }
}

impl RewriteRule for CheckboxRule {
    fn rewrite(&self, mut segments: Vec<Segment>) -> Vec<Segment> {
        for re in &self.options {
            segments = rewrite_open_spans(segments, |t| Self::tick(re, t));
        }
        segments
    }
}

/// The rule chain used for every rewritten paragraph: placeholders, schedule keys, checkboxes.
pub struct Rewriter<'a> {
    rules: Vec<Box<dyn RewriteRule + 'a>>,
}

impl<'a> Rewriter<'a> {
    pub fn new(values: &'a FillValues) -> Self {
        Self {
            rules: vec![
                Box::new(PlaceholderRule {
                    answers: &values.answers,
                }),
                Box::new(ScheduleKeyRule::new(&values.schedule_values)),
                Box::new(CheckboxRule::new(&values.selected_checkboxes)),
            ],
        }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut segments = segment(text);
        for rule in &self.rules {
            segments = rule.rewrite(segments);
        }
        render(&segments)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub paragraphs_rewritten: usize,
    pub schedule_cells_set: usize,
}

fn rewrite_paragraph(p: &mut Paragraph, rewriter: &Rewriter<'_>) -> bool {
    if p.runs.is_empty() {
        return false;
    }
    let original = p.text();
    let rewritten = rewriter.apply(&original);
    rewritten != original && p.replace_text(&rewritten)
}

pub fn fill_document(doc: &mut Document, values: &FillValues, locale: WeekdayLocale) -> FillSummary {
    let rewriter = Rewriter::new(values);
    let mut summary = FillSummary::default();

    for p in &mut doc.paragraphs {
        if rewrite_paragraph(p, &rewriter) {
            summary.paragraphs_rewritten += 1;
        }
    }

    let [first_day, _] = locale.first_weekdays();
    for table in &mut doc.tables {
        if header_labels(table).iter().any(|h| h == first_day) {
            let keys: Vec<(usize, usize, String)> = schedule_keys(table).collect();
            for (r, c, key) in keys {
                let Some(value) = values.schedule_values.get(&key) else {
                    continue;
                };
                if let Some(cell) = table.cell_mut(r, c) {
                    cell.set_text(value);
                    summary.schedule_cells_set += 1;
                }
            }
        } else {
            for p in table.paragraphs_mut() {
                if rewrite_paragraph(p, &rewriter) {
                    summary.paragraphs_rewritten += 1;
                }
            }
        }
    }
    summary
}
