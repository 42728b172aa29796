//! Git config file format.
//!
//! [`ConfigDocument`] is the ordered key/value view of a profile's own file.
//! The line-level [`parse_line`] is also used by the include editor in
//! `switch`, which rewrites a user's config in place and must leave every
//! unrelated line untouched.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::GitswError;
use crate::fs_utils::write_atomic;

/// Check that `value` can be stored in a config file and read back unchanged.
pub fn validate_value(value: &str) -> Result<(), GitswError> {
    let reason = if value.contains('\0') {
        "contains a NUL byte"
    } else if value.contains(['\n', '\r']) {
        "contains a line break"
    } else if value.chars().any(|c| c.is_control() && c != '\t') {
        "contains a control character"
    } else {
        return Ok(());
    };

    Err(GitswError::InvalidValue {
        value: value.to_string(),
        reason,
    })
}

/// A dotted config key: `section.name` or `section.subsection.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub section: String,
    pub subsection: Option<String>,
    pub name: String,
}

impl Key {
    pub fn parse(key: &str) -> Result<Self, GitswError> {
        let invalid = || GitswError::InvalidKey(key.to_string());

        let (section, rest) = key.split_once('.').ok_or_else(invalid)?;
        let (subsection, name) = match rest.rsplit_once('.') {
            Some((sub, name)) => (Some(sub), name),
            None => (None, rest),
        };

        if !is_valid_section(section) || !is_valid_name(name) {
            return Err(invalid());
        }
        if subsection.is_some_and(|s| s.contains(['\n', '\0'])) {
            return Err(invalid());
        }

        Ok(Self {
            section: section.to_string(),
            subsection: subsection.map(str::to_string),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subsection {
            Some(sub) => write!(f, "{}.{}.{}", self.section, sub, self.name),
            None => write!(f, "{}.{}", self.section, self.name),
        }
    }
}

fn is_valid_section(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    subsection: Option<String>,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Section names compare case-insensitively, subsections exactly.
    fn is(&self, name: &str, subsection: Option<&str>) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.subsection.as_deref() == subsection
    }

    fn key_for(&self, name: &str) -> String {
        Key {
            section: self.name.clone(),
            subsection: self.subsection.clone(),
            name: name.to_string(),
        }
        .to_string()
    }
}

/// Ordered set of config entries, grouped by section in first-seen order.
///
/// Serialization is deterministic: the same document always renders to the
/// same bytes, and parsing that output renders identically again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: Vec<Section>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any existing value for that key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), GitswError> {
        let key = Key::parse(key)?;
        validate_value(value)?;

        let idx = self.section_index(&key.section, key.subsection.as_deref());
        let section = &mut self.sections[idx];

        let mut replaced = false;
        section.entries.retain_mut(|(name, v)| {
            if !name.eq_ignore_ascii_case(&key.name) {
                return true;
            }
            if replaced {
                return false;
            }
            *v = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            section.entries.push((key.name, value.to_string()));
        }

        Ok(())
    }

    /// Value of `key`; the last occurrence wins, as in git.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = Key::parse(key).ok()?;
        self.sections
            .iter()
            .filter(|s| s.is(&key.section, key.subsection.as_deref()))
            .flat_map(|s| s.entries.iter())
            .filter(|(name, _)| name.eq_ignore_ascii_case(&key.name))
            .map(|(_, value)| value.as_str())
            .last()
    }

    /// All entries as `(dotted key, value)` in document order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.sections.iter().flat_map(|section| {
            section
                .entries
                .iter()
                .map(move |(name, value)| (section.key_for(name), value.as_str()))
        })
    }

    fn section_index(&mut self, name: &str, subsection: Option<&str>) -> usize {
        if let Some(idx) = self.sections.iter().position(|s| s.is(name, subsection)) {
            return idx;
        }
        self.sections.push(Section {
            name: name.to_string(),
            subsection: subsection.map(str::to_string),
            entries: Vec::new(),
        });
        self.sections.len() - 1
    }

    /// Parse config text. `path` is only used for error messages.
    ///
    /// Repeated section headers are merged into the first one.
    pub fn parse(text: &str, path: &Path) -> Result<Self, GitswError> {
        let mut doc = Self::new();
        let mut current = None;

        for (line_no, line) in logical_lines(text) {
            let err = |message: String| GitswError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message,
            };

            match parse_line(&line).map_err(&err)? {
                ParsedLine::Blank => {}
                ParsedLine::Section {
                    name,
                    subsection,
                    entry,
                } => {
                    let idx = doc.section_index(&name, subsection.as_deref());
                    current = Some(idx);
                    if let Some((name, value)) = entry {
                        let value = value.unwrap_or_else(|| "true".to_string());
                        doc.sections[idx].entries.push((name, value));
                    }
                }
                ParsedLine::Entry { name, value } => {
                    let idx = current.ok_or_else(|| err("entry outside of a section".to_string()))?;
                    // A bare `key` is git's shorthand for `key = true`.
                    let value = value.unwrap_or_else(|| "true".to_string());
                    doc.sections[idx].entries.push((name, value));
                }
            }
        }

        Ok(doc)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Ok(Self::parse(&text, path)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_string())
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            match &section.subsection {
                Some(sub) => writeln!(f, "[{} \"{}\"]", section.name, escape_subsection(sub))?,
                None => writeln!(f, "[{}]", section.name)?,
            }
            for (name, value) in &section.entries {
                writeln!(f, "\t{} = {}", name, escape_value(value))?;
            }
        }
        Ok(())
    }
}

/// One physical line of a config file, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedLine {
    /// Empty line or comment.
    Blank,
    Section {
        name: String,
        subsection: Option<String>,
        /// `[user] name = x` puts an entry on the header line itself.
        entry: Option<(String, Option<String>)>,
    },
    Entry {
        name: String,
        value: Option<String>,
    },
}

pub(crate) fn parse_line(line: &str) -> Result<ParsedLine, String> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with(['#', ';']) {
        return Ok(ParsedLine::Blank);
    }
    if let Some(rest) = line.strip_prefix('[') {
        return parse_section_header(rest);
    }
    parse_entry(line)
}

fn parse_section_header(rest: &str) -> Result<ParsedLine, String> {
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '.'))
        .unwrap_or(rest.len());
    let (name, mut rest) = rest.split_at(name_len);

    // Legacy `[section.subsection]` form
    let (name, mut subsection) = match name.split_once('.') {
        Some((name, sub)) => (name, Some(sub.to_string())),
        None => (name, None),
    };
    if name.is_empty() {
        return Err("missing section name".to_string());
    }

    rest = rest.trim_start_matches([' ', '\t']);
    if let Some(quoted) = rest.strip_prefix('"') {
        if subsection.is_some() {
            return Err("subsection given twice".to_string());
        }
        let mut sub = String::new();
        let mut end = None;
        let mut chars = quoted.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => sub.push(escaped),
                    None => break,
                },
                '"' => {
                    end = Some(i + 1);
                    break;
                }
                _ => sub.push(c),
            }
        }
        let end = end.ok_or("unterminated subsection name")?;
        subsection = Some(sub);
        rest = &quoted[end..];
    }

    let tail = rest
        .strip_prefix(']')
        .ok_or("missing ']' after section name")?
        .trim();
    let entry = if tail.is_empty() || tail.starts_with(['#', ';']) {
        None
    } else {
        match parse_entry(tail)? {
            ParsedLine::Entry { name, value } => Some((name, value)),
            _ => None,
        }
    };

    Ok(ParsedLine::Section {
        name: name.to_string(),
        subsection,
        entry,
    })
}

fn parse_entry(line: &str) -> Result<ParsedLine, String> {
    let name_len = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(line.len());
    let (name, rest) = line.split_at(name_len);
    if !is_valid_name(name) {
        return Err(format!("invalid variable name in {line:?}"));
    }

    let rest = rest.trim_start_matches([' ', '\t']);
    if rest.is_empty() || rest.starts_with(['#', ';']) {
        return Ok(ParsedLine::Entry {
            name: name.to_string(),
            value: None,
        });
    }

    let raw = rest
        .strip_prefix('=')
        .ok_or_else(|| format!("expected '=' after '{name}'"))?;

    Ok(ParsedLine::Entry {
        name: name.to_string(),
        value: Some(unescape_value(raw)?),
    })
}

/// Decode the right-hand side of `name = value`.
pub(crate) fn unescape_value(raw: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut in_quotes = false;
    // unquoted whitespace at the end of `out`, trimmed when the line ends
    let mut trailing_ws = 0;

    let mut chars = raw.trim_start_matches([' ', '\t']).chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                trailing_ws = 0;
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('b') => '\u{8}',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    Some(other) => return Err(format!("unknown escape sequence '\\{other}'")),
                    None => return Err("dangling backslash".to_string()),
                };
                out.push(escaped);
                trailing_ws = 0;
            }
            '#' | ';' if !in_quotes => break,
            ' ' | '\t' if !in_quotes => {
                out.push(c);
                trailing_ws += 1;
            }
            _ => {
                out.push(c);
                trailing_ws = 0;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    out.truncate(out.len() - trailing_ws);
    Ok(out)
}

/// Encode a value so that [`unescape_value`] returns it unchanged.
pub(crate) fn escape_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.starts_with(' ')
        || value.ends_with(' ')
        || value.contains(['#', ';']);

    let mut out = String::with_capacity(value.len() + 2);
    if needs_quotes {
        out.push('"');
    }
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{8}' => out.push_str("\\b"),
            _ => out.push(c),
        }
    }
    if needs_quotes {
        out.push('"');
    }
    out
}

fn escape_subsection(sub: &str) -> String {
    sub.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Physical lines joined across trailing-backslash continuations, each
/// tagged with the 1-based number of its first physical line.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (i, raw) in text.lines().enumerate() {
        let (start, mut buf) = pending.take().unwrap_or_else(|| (i + 1, String::new()));
        if is_continued(raw) {
            buf.push_str(&raw[..raw.len() - 1]);
            pending = Some((start, buf));
        } else {
            buf.push_str(raw);
            out.push((start, buf));
        }
    }
    out.extend(pending);
    out
}

pub(crate) fn is_continued(line: &str) -> bool {
    if line.trim_start().starts_with(['#', ';']) {
        return false;
    }
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}
