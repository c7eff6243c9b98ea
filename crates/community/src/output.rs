//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders cache entries in the format selected by `--output`. Table uses
//! `tabled` with a colored status line; structured formats use serde.

use std::io::{self, IsTerminal, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use community_core::{CacheEntry, Employee, Payload, Proposal, Review, ServiceDetail};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct EmployeeRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Photo")]
    photo: &'static str,
}

impl From<&Employee> for EmployeeRow {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            age: e.age.map_or_else(|| "-".into(), |a| a.to_string()),
            email: e.email.clone().unwrap_or_else(|| "-".into()),
            photo: if e.photo.is_some() { "yes" } else { "-" },
        }
    }
}

#[derive(Tabled)]
struct ProposalRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Closes")]
    closes: String,
}

impl From<&Proposal> for ProposalRow {
    fn from(p: &Proposal) -> Self {
        Self {
            // Optimistic rows have no server id yet.
            id: if p.id == 0 { "-".into() } else { p.id.to_string() },
            name: p.name.clone(),
            status: p.status.clone(),
            author: p.written_by.clone().unwrap_or_else(|| "-".into()),
            created: p.create_date.clone(),
            closes: p.close_date.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

#[derive(Tabled)]
struct ReviewRow {
    #[tabled(rename = "Title")]
    name: String,
    #[tabled(rename = "Rating")]
    rating: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Review")]
    description: String,
}

impl From<&Review> for ReviewRow {
    fn from(r: &Review) -> Self {
        Self {
            name: r.name.clone(),
            rating: format!("{:.1}", r.rating),
            author: r.written_by.clone().unwrap_or_else(|| "-".into()),
            description: r.description.clone(),
        }
    }
}

fn service_detail(s: &ServiceDetail) -> String {
    let mut lines = vec![
        format!("ID:            {}", s.id),
        format!("Name:          {}", s.name),
        format!("Qualification: {:.1}", s.qualification),
        format!("Following:     {}", if s.is_following { "yes" } else { "no" }),
    ];
    if let Some(ref description) = s.description {
        lines.push(format!("Description:   {description}"));
    }
    if let Some(ref image) = s.image {
        lines.push(format!("Image:         {} bytes (base64)", image.len()));
    }
    lines.join("\n")
}

// ── Entry rendering ──────────────────────────────────────────────────

#[derive(Serialize)]
struct EntryDoc<'a> {
    key: String,
    stale: bool,
    pending: usize,
    last_sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    data: Option<&'a Payload>,
}

impl<'a> From<&'a CacheEntry> for EntryDoc<'a> {
    fn from(entry: &'a CacheEntry) -> Self {
        Self {
            key: entry.key.to_string(),
            stale: entry.is_stale(),
            pending: entry.pending.len(),
            last_sequence: entry.last_sequence,
            error: entry
                .health
                .last_error
                .as_ref()
                .filter(|_| entry.is_stale())
                .map(ToString::to_string),
            data: entry.view.as_deref(),
        }
    }
}

/// Render a set of entries (one per kind of a page).
pub fn render_entries(
    format: OutputFormat,
    entries: &[CacheEntry],
    color: bool,
) -> Result<String, CliError> {
    let docs: Vec<EntryDoc<'_>> = entries.iter().map(EntryDoc::from).collect();
    match format {
        OutputFormat::Table => Ok(entries
            .iter()
            .map(|entry| render_entry_table(entry, color))
            .collect::<Vec<_>>()
            .join("\n\n")),
        OutputFormat::Json => serde_json::to_string_pretty(&docs).map_err(serialize_err),
        OutputFormat::JsonCompact => serde_json::to_string(&docs).map_err(serialize_err),
        OutputFormat::Yaml => serde_yaml::to_string(&docs).map_err(serialize_err),
        OutputFormat::Plain => Ok(entries
            .iter()
            .filter_map(|entry| entry.view.as_deref())
            .flat_map(plain_ids)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn serialize_err(e: impl std::fmt::Display) -> CliError {
    CliError::Internal(format!("serialization failed: {e}"))
}

fn plain_ids(payload: &Payload) -> Vec<String> {
    match payload {
        Payload::Service(s) => vec![s.id.to_string()],
        Payload::Employees(list) => list.iter().map(|e| e.id.to_string()).collect(),
        Payload::Proposals(list) => list.iter().map(|p| p.id.to_string()).collect(),
        Payload::Reviews(list) => list.iter().map(|r| r.name.clone()).collect(),
    }
}

fn status_line(entry: &CacheEntry, color: bool) -> String {
    let mut line = entry.key.to_string();
    if let Some(age) = entry.data_age(Utc::now()) {
        line.push_str(&format!("  updated {}s ago", age.num_seconds().max(0)));
    }
    if entry.has_pending() {
        let pending = format!("  {} pending", entry.pending.len());
        line.push_str(&if color {
            pending.yellow().to_string()
        } else {
            pending
        });
    }
    if entry.is_stale() {
        let reason = entry
            .health
            .last_error
            .as_ref()
            .map_or_else(String::new, |e| format!(" ({e})"));
        let stale = format!("  stale{reason}");
        line.push_str(&if color { stale.red().to_string() } else { stale });
    }
    if color { line.bold().to_string() } else { line }
}

fn render_entry_table(entry: &CacheEntry, color: bool) -> String {
    let header = status_line(entry, color);
    let body = match entry.view.as_deref() {
        None => "(no data yet)".to_owned(),
        Some(Payload::Service(s)) => service_detail(s),
        Some(Payload::Employees(list)) => table(list.iter().map(EmployeeRow::from)),
        Some(Payload::Proposals(list)) => table(list.iter().map(ProposalRow::from)),
        Some(Payload::Reviews(list)) => table(list.iter().map(ReviewRow::from)),
    };
    format!("{header}\n{body}")
}

fn table<R: Tabled>(rows: impl IntoIterator<Item = R>) -> String {
    let rows: Vec<R> = rows.into_iter().collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
