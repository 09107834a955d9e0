use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::Context;

/// What an input list contains. Also selects the retrieval mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ListMode {
    Songs,
    Albums,
    Playlists,
    Artists,
}

impl ListMode {
    /// Input files in resolution priority order.
    pub const PRIORITY: [ListMode; 4] = [
        ListMode::Songs,
        ListMode::Albums,
        ListMode::Playlists,
        ListMode::Artists,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ListMode::Songs => "songs.txt",
            ListMode::Albums => "album.txt",
            ListMode::Playlists => "playlist.txt",
            ListMode::Artists => "artist.txt",
        }
    }

    /// Artist names never contain commas; everything else may carry a
    /// `, qualifier` suffix.
    fn allows_commas_in_items(self) -> bool {
        !matches!(self, ListMode::Artists)
    }
}

/// One line of an input list: a name (or catalog reference) plus an optional
/// qualifier (artist for songs and albums, owner for playlists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub qualifier: Option<String>,
}

/// Split an entry at its first comma.
pub fn parse_entry(entry: &str) -> ListEntry {
    let entry = entry.trim();
    match entry.split_once(',') {
        Some((name, qualifier)) => ListEntry {
            name: name.trim().to_string(),
            qualifier: Some(qualifier.trim().to_string()).filter(|q| !q.is_empty()),
        },
        None => ListEntry {
            name: entry.to_string(),
            qualifier: None,
        },
    }
}

/// Pick the input file to process. Returns the mode and path of the highest
/// priority file that exists, logging when lower priority files are ignored.
pub fn resolve_input_file(input_directory: &Path) -> Option<(ListMode, PathBuf)> {
    let present: Vec<(ListMode, PathBuf)> = ListMode::PRIORITY
        .iter()
        .map(|mode| (*mode, input_directory.join(mode.file_name())))
        .filter(|(_, path)| path.is_file())
        .collect();

    let chosen = present.first().cloned()?;
    if present.len() > 1 {
        let ignored: Vec<&str> = present[1..].iter().map(|(mode, _)| mode.file_name()).collect();
        tracing::info!(
            "Multiple input files found; using {} and ignoring {}",
            chosen.0.file_name(),
            ignored.join(", ")
        );
    }
    Some(chosen)
}

/// Read and parse an input list file. A missing file is an empty list.
pub fn read_list_file(path: &Path, mode: ListMode) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    tracing::debug!("Parsing list file: {}", path.display());
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read list file: {}", path.display()))?;
    Ok(parse_list(&content, mode))
}

/// Parse list content, trying JSON, then a quoted literal list, then a
/// line or comma based fallback.
pub fn parse_list(content: &str, mode: ListMode) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }

    if let Some(items) = parse_json(content).or_else(|| parse_literal(content)) {
        return items;
    }

    if mode.allows_commas_in_items() {
        parse_lines(content)
    } else {
        parse_commas(content)
    }
}

fn parse_json(content: &str) -> Option<Vec<String>> {
    use serde_json::Value;

    match serde_json::from_str::<Value>(content).ok()? {
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Null => None,
                    Value::String(text) => Some(text),
                    Value::Bool(true) => Some("True".to_string()),
                    Value::Bool(false) => Some("False".to_string()),
                    other => Some(other.to_string()),
                })
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .collect(),
        ),
        Value::String(text) if !text.trim().is_empty() => Some(vec![text.trim().to_string()]),
        _ => None,
    }
}

/// Literal value inside a bracketed list
#[derive(Debug, PartialEq)]
enum Literal {
    Text(String),
    None,
}

/// Parse `['a', "b", 3, None]` or a single quoted string, the formats a
/// Python `repr` produces. Anything else is rejected.
fn parse_literal(content: &str) -> Option<Vec<String>> {
    let mut parser = LiteralParser {
        chars: content.chars().peekable(),
    };

    let items = if content.starts_with('[') {
        parser.list()?
    } else {
        vec![parser.value()?]
    };
    parser.skip_whitespace();
    if parser.chars.peek().is_some() {
        return None;
    }

    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Literal::Text(text) => Some(text.trim().to_string()),
                Literal::None => None,
            })
            .filter(|text| !text.is_empty())
            .collect(),
    )
}

struct LiteralParser<I: Iterator<Item = char>> {
    chars: std::iter::Peekable<I>,
}

impl<I: Iterator<Item = char>> LiteralParser<I> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn list(&mut self) -> Option<Vec<Literal>> {
        self.skip_whitespace();
        self.chars.next_if_eq(&'[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.chars.next_if_eq(&']').is_some() {
                return Some(items);
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.chars.next()? {
                ',' => continue,
                ']' => return Some(items),
                _ => return None,
            }
        }
    }

    fn value(&mut self) -> Option<Literal> {
        self.skip_whitespace();
        match *self.chars.peek()? {
            quote @ ('\'' | '"') => {
                self.chars.next();
                self.quoted(quote).map(Literal::Text)
            }
            _ => self.bare(),
        }
    }

    fn quoted(&mut self, quote: char) -> Option<String> {
        let mut text = String::new();
        loop {
            match self.chars.next()? {
                c if c == quote => return Some(text),
                '\\' => match self.chars.next()? {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    other => text.push(other),
                },
                c => text.push(c),
            }
        }
    }

    /// Numbers, `None`, `True` and `False`
    fn bare(&mut self) -> Option<Literal> {
        let mut word = String::new();
        while let Some(c) = self
            .chars
            .next_if(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
        {
            word.push(c);
        }
        match word.as_str() {
            "None" => Some(Literal::None),
            "True" | "False" => Some(Literal::Text(word)),
            _ if word.parse::<f64>().is_ok() => Some(Literal::Text(word)),
            _ => None,
        }
    }
}

fn strip_brackets(content: &str) -> &str {
    content
        .strip_prefix('[')
        .and_then(|text| text.strip_suffix(']'))
        .unwrap_or(content)
}

/// Remove one pair of matching surrounding quotes.
pub fn strip_quotes(text: &str) -> String {
    let text = text.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return text[1..text.len() - 1].trim().to_string();
        }
    }
    text.to_string()
}

fn parse_lines(content: &str) -> Vec<String> {
    strip_brackets(content)
        .lines()
        .map(|line| line.trim().trim_matches(',').trim())
        .filter(|line| !line.is_empty())
        .map(strip_quotes)
        .filter(|line| !line.is_empty())
        .collect()
}

fn parse_commas(content: &str) -> Vec<String> {
    strip_brackets(content)
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(strip_quotes)
        .filter(|part| !part.is_empty())
        .collect()
}
