// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures into miette diagnostics that point at the
//! offending line of `vaultline.toml` and suggest the closest valid key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key needs before it is offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{key}` is not a vaultline setting{}", in_section(.section))]
    #[diagnostic(
        code(vaultline::config::unknown_key),
        help("{}", unknown_key_help(suggestion, valid_keys))
    )]
    UnknownKey {
        section: Option<String>,
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(vaultline::config::invalid_type), help("use {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("`{key}` is required")]
    #[diagnostic(code(vaultline::config::missing_key))]
    MissingKey { key: String },

    /// Parsed fine, but the value is out of range.
    #[error("invalid setting: {message}")]
    #[diagnostic(code(vaultline::config::validation))]
    Validation { message: String },

    #[error("cannot load configuration: {0}")]
    #[diagnostic(code(vaultline::config::other))]
    Other(String),
}

fn in_section(section: &Option<String>) -> String {
    section.as_ref().map(|s| format!(" in [{s}]")).unwrap_or_default()
}

fn unknown_key_help(suggestion: &Option<String>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? (expected one of: {valid_keys})"),
        None => format!("expected one of: {valid_keys}"),
    }
}

/// The TOML files that fed a failed load, kept for span lookup.
#[derive(Debug, Default)]
pub struct TomlSources(Vec<(String, String)>);

impl TomlSources {
    pub fn inline(content: &str) -> Self {
        Self(vec![("<inline>".to_string(), content.to_string())])
    }

    /// Reads whichever of `paths` exist; unreadable files are skipped.
    pub fn read<P: AsRef<std::path::Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self(
            paths
                .into_iter()
                .filter_map(|path| {
                    let path = path.as_ref();
                    let content = std::fs::read_to_string(path).ok()?;
                    Some((path.display().to_string(), content))
                })
                .collect(),
        )
    }

    /// The file the error came from, or the only file when figment did
    /// not record one (inline providers).
    fn origin(&self, error: &figment::Error) -> Option<&(String, String)> {
        let file = error
            .metadata
            .as_ref()
            .and_then(|m| m.source.as_ref())
            .and_then(|source| match source {
                figment::Source::File(path) => Some(path.display().to_string()),
                _ => None,
            });
        match file {
            Some(file) => self.0.iter().find(|(name, _)| *name == file),
            None if self.0.len() == 1 => self.0.first(),
            None => None,
        }
    }

    fn locate(
        &self,
        error: &figment::Error,
        key: &str,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        let Some((name, content)) = self.origin(error) else {
            return (None, None);
        };
        match key_offset(content, error.path.first().map(String::as_str), key) {
            Some(offset) => (
                Some(SourceSpan::new(offset.into(), key.len())),
                Some(NamedSource::new(name, content.clone())),
            ),
            None => (None, None),
        }
    }
}

/// Splits a figment error chain into one diagnostic per failure.
pub fn diagnose(err: figment::Error, sources: &TomlSources) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(key, expected) => {
                let (span, src) = sources.locate(&error, key);
                ConfigError::UnknownKey {
                    section: error.path.first().cloned(),
                    key: key.clone(),
                    suggestion: suggest_key(key, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(key) => ConfigError::MissingKey {
                key: key.to_string(),
            },
            Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                found: found.to_string(),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Byte offset of the `key = ...` line, searching below `[section]` when
/// one is given.
pub fn key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let start = match section {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let body = line.trim_start();
        let assigns = body
            .strip_prefix(key)
            .is_some_and(|rest| rest.trim_start().starts_with('='));
        if assigns {
            return Some(offset + (line.len() - body.len()));
        }
        if body.starts_with('[') {
            return None;
        }
        offset += line.len();
    }
    None
}

/// The valid key closest to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let (score, best) = valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .max_by(|a, b| a.0.total_cmp(&b.0))?;
    (score > SUGGESTION_THRESHOLD).then(|| best.to_string())
}

/// Prints every diagnostic to stderr with miette's graphical renderer.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_match() {
        let valid = &["connect_timeout_secs", "term", "cols", "rows", "output_buffer"];
        assert_eq!(
            suggest_key("conect_timeout_secs", valid),
            Some("connect_timeout_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        assert_eq!(suggest_key("zzzzzz", &["name", "log_level"]), None);
        assert_eq!(suggest_key("anything", &[]), None);
    }

    #[test]
    fn key_offset_is_scoped_to_section() {
        let content = "[app]\nterm = 1\n[session]\nterm = \"vt100\"\n";
        let offset = key_offset(content, Some("session"), "term").unwrap();
        assert!(offset > content.find("[session]").unwrap());
        assert_eq!(&content[offset..offset + 4], "term");
    }

    #[test]
    fn key_offset_stops_at_next_section() {
        let content = "[app]\nname = \"x\"\n[session]\nterm = \"vt100\"\n";
        assert_eq!(key_offset(content, Some("app"), "term"), None);
    }

    #[test]
    fn unknown_key_message_names_section() {
        let error = ConfigError::UnknownKey {
            section: Some("sync".to_string()),
            key: "api_url".to_string(),
            suggestion: None,
            valid_keys: "api_base_url".to_string(),
            span: None,
            src: None,
        };
        assert_eq!(error.to_string(), "`api_url` is not a vaultline setting in [sync]");
    }
}
