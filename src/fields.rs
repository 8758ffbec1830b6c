use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::docx::model::{Cell, Document, Table};

pub static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>]+)>").expect("placeholder"));

static CHECKBOX_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"☐\s*(.+)").expect("box checkbox"),
        Regex::new(r"\[\s?\]\s*(.+)").expect("bracket checkbox"),
    ]
});

/// Language of the weekday headers that mark a schedule table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekdayLocale {
    #[default]
    De,
    En,
}

impl WeekdayLocale {
    /// The first two working days, lower-cased.
    pub fn first_weekdays(self) -> [&'static str; 2] {
        match self {
            Self::De => ["montag", "dienstag"],
            Self::En => ["monday", "tuesday"],
        }
    }
}

impl FromStr for WeekdayLocale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" | "german" => Ok(Self::De),
            "en" | "english" => Ok(Self::En),
            other => Err(anyhow!("unknown schedule locale: {other} (expected de or en)")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TemplateFields {
    pub placeholders: BTreeSet<String>,
    pub schedule_fields: Vec<String>,
    pub checkbox_options: Vec<String>,
}

pub fn extract_fields(doc: &Document, locale: WeekdayLocale) -> TemplateFields {
    TemplateFields {
        placeholders: extract_placeholders(doc),
        schedule_fields: extract_schedule_fields(doc, locale),
        checkbox_options: extract_checkboxes(doc),
    }
}

pub fn extract_placeholders(doc: &Document) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for p in doc.all_paragraphs() {
        let text = p.text();
        for cap in PLACEHOLDER_RE.captures_iter(&text) {
            out.insert(cap[1].trim().to_string());
        }
    }
    out
}

pub fn extract_schedule_fields(doc: &Document, locale: WeekdayLocale) -> Vec<String> {
    let [first, second] = locale.first_weekdays();
    let mut out = Vec::new();
    for table in &doc.tables {
        let headers = header_labels(table);
        if headers.iter().any(|h| h == first) && headers.iter().any(|h| h == second) {
            out.extend(schedule_keys(table).map(|(_, _, key)| key));
        }
    }
    out
}

pub fn extract_checkboxes(doc: &Document) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in doc.all_paragraphs() {
        let text = p.text();
        for re in CHECKBOX_RES.iter() {
            if let Some(cap) = re.captures(&text) {
                let opt = cap[1].trim().to_string();
                if !out.contains(&opt) {
                    out.push(opt);
                }
            }
        }
    }
    out
}

/// Row-0 texts per grid column, trimmed and lower-cased. A spanned header cell repeats.
pub(crate) fn header_labels(table: &Table) -> Vec<String> {
    (0..table.grid_width(0))
        .map(|c| cell_label(table.cell(0, c)).to_lowercase())
        .collect()
}

/// `(row, grid col, "{row_label}_{column_header}")` for every data row and data column.
pub(crate) fn schedule_keys(table: &Table) -> impl Iterator<Item = (usize, usize, String)> + '_ {
    let header_count = table.grid_width(0);
    (1..table.rows.len()).flat_map(move |r| {
        let row_label = cell_label(table.cell(r, 0));
        (1..header_count).map(move |c| {
            let day = cell_label(table.cell(0, c));
            (r, c, format!("{row_label}_{day}"))
        })
    })
}

fn cell_label(cell: Option<&Cell>) -> String {
    cell.map(|c| c.text().trim().to_string()).unwrap_or_default()
}
