//! Data-file mappings: `source` on disk → `dest` inside the artifact.
//!
//! The two backends disagree on how a mapping is written on the command line
//! (`src=dst` versus `src;dst`). The separator is always supplied by the
//! caller, because either character may legitimately occur inside a path.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::fs::resolve_path;

/// Separator between source and destination in a raw mapping token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingSeparator {
    /// `source=dest`
    Equals,
    /// `source;dest`
    Semicolon,
}

impl MappingSeparator {
    pub fn as_char(&self) -> char {
        match self {
            MappingSeparator::Equals => '=',
            MappingSeparator::Semicolon => ';',
        }
    }
}

impl fmt::Display for MappingSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A `(source, dest)` pair describing a data file or directory to embed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathMapping {
    source: PathBuf,
    dest: PathBuf,
}

impl PathMapping {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        PathMapping {
            source: source.into(),
            dest: dest.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Render as a single backend token using `separator`.
    pub fn to_token(&self, separator: MappingSeparator) -> String {
        format!(
            "{}{}{}",
            self.source.display(),
            separator.as_char(),
            self.dest.display()
        )
    }
}

/// Errors produced while parsing or normalizing mappings.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum MappingError {
    #[error("invalid data mapping `{raw}`: {reason}")]
    #[diagnostic(
        code(stowage::mapping::syntax),
        help("Write mappings as `source{separator}dest`")
    )]
    Syntax {
        raw: String,
        separator: MappingSeparator,
        reason: String,
    },

    #[error("data source `{}` does not exist", .path.display())]
    #[diagnostic(code(stowage::mapping::source_not_found))]
    SourceNotFound { path: PathBuf },
}

/// Parses raw mapping tokens with a fixed separator.
#[derive(Debug, Clone)]
pub struct PathMappingParser {
    separator: MappingSeparator,
    base: PathBuf,
}

impl PathMappingParser {
    /// Create a parser; relative sources are resolved against `base`.
    pub fn new(separator: MappingSeparator, base: impl Into<PathBuf>) -> Self {
        PathMappingParser {
            separator,
            base: base.into(),
        }
    }

    /// Split a raw token without touching the filesystem.
    pub fn split(&self, raw: &str) -> Result<PathMapping, MappingError> {
        let sep = self.separator.as_char();
        let syntax = |reason: String| MappingError::Syntax {
            raw: raw.to_string(),
            separator: self.separator,
            reason,
        };

        let count = raw.matches(sep).count();
        if count != 1 {
            return Err(syntax(if count == 0 {
                format!("separator `{}` not found", sep)
            } else {
                format!("separator `{}` appears {} times, expected exactly once", sep, count)
            }));
        }

        // count == 1, so split_once always succeeds
        let (source, dest) = raw.split_once(sep).unwrap_or((raw, ""));
        let (source, dest) = (source.trim(), dest.trim());
        if source.is_empty() {
            return Err(syntax("source is empty".to_string()));
        }
        if dest.is_empty() {
            return Err(syntax("destination is empty".to_string()));
        }

        Ok(PathMapping::new(source, dest))
    }

    /// Split a raw token and check that its source exists.
    pub fn parse(&self, raw: &str) -> Result<PathMapping, MappingError> {
        let mapping = self.split(raw)?;
        self.check_source(&mapping)?;
        Ok(mapping)
    }

    /// Parse several tokens, preserving order. The first error wins.
    pub fn parse_all<I, S>(&self, raws: I) -> Result<Vec<PathMapping>, MappingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raws.into_iter().map(|raw| self.parse(raw.as_ref())).collect()
    }

    /// Re-check already split mappings against the filesystem, preserving order.
    pub fn normalize(&self, mappings: &[PathMapping]) -> Result<Vec<PathMapping>, MappingError> {
        mappings
            .iter()
            .map(|m| self.check_source(m).map(|()| m.clone()))
            .collect()
    }

    /// Absolute location of a mapping's source.
    pub fn resolve_source(&self, mapping: &PathMapping) -> PathBuf {
        resolve_path(&self.base, mapping.source())
    }

    fn check_source(&self, mapping: &PathMapping) -> Result<(), MappingError> {
        if self.resolve_source(mapping).exists() {
            Ok(())
        } else {
            Err(MappingError::SourceNotFound {
                path: mapping.source().to_path_buf(),
            })
        }
    }
}

/// Resolve overlapping destinations: the last mapping for a destination wins.
///
/// The survivors keep the relative order of their own positions.
pub fn effective_mappings(mappings: &[PathMapping]) -> Vec<&PathMapping> {
    let mut last: HashMap<&Path, usize> = HashMap::new();
    for (i, m) in mappings.iter().enumerate() {
        last.insert(m.dest(), i);
    }

    mappings
        .iter()
        .enumerate()
        .filter(|(i, m)| last.get(m.dest()) == Some(i))
        .map(|(_, m)| m)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parser(sep: MappingSeparator) -> PathMappingParser {
        PathMappingParser::new(sep, "/nonexistent-base")
    }

    #[test]
    fn test_split_equals() {
        let m = parser(MappingSeparator::Equals).split("a=b").unwrap();
        assert_eq!(m, PathMapping::new("a", "b"));
    }

    #[test]
    fn test_separator_is_not_auto_detected() {
        let err = parser(MappingSeparator::Semicolon).split("a=b").unwrap_err();
        assert!(matches!(err, MappingError::Syntax { .. }));

        let err = parser(MappingSeparator::Equals).split("a;b").unwrap_err();
        assert!(matches!(err, MappingError::Syntax { .. }));

        let m = parser(MappingSeparator::Semicolon).split("a;b").unwrap();
        assert_eq!(m, PathMapping::new("a", "b"));
    }

    #[test]
    fn test_separator_must_appear_once() {
        let err = parser(MappingSeparator::Equals).split("a=b=c").unwrap_err();
        match err {
            MappingError::Syntax { reason, .. } => assert!(reason.contains("2 times")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_sides_rejected() {
        let p = parser(MappingSeparator::Equals);
        assert!(p.split("=b").is_err());
        assert!(p.split("a=").is_err());
        assert!(p.split("  = ").is_err());
    }

    #[test]
    fn test_path_with_other_separator_is_kept() {
        // `;` parser leaves `=` inside paths alone
        let m = parser(MappingSeparator::Semicolon)
            .split("assets/a=b.png;assets")
            .unwrap();
        assert_eq!(m.source(), Path::new("assets/a=b.png"));
        assert_eq!(m.dest(), Path::new("assets"));
    }

    #[test]
    fn test_parse_checks_source_exists() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("assets")).unwrap();
        let p = PathMappingParser::new(MappingSeparator::Equals, tmp.path());

        assert!(p.parse("assets=assets").is_ok());
        assert_eq!(
            p.parse("missing=missing").unwrap_err(),
            MappingError::SourceNotFound {
                path: PathBuf::from("missing")
            }
        );
    }

    #[test]
    fn test_parse_all_preserves_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["c", "a", "b"] {
            std::fs::write(tmp.path().join(name), name).unwrap();
        }
        let p = PathMappingParser::new(MappingSeparator::Semicolon, tmp.path());

        let mappings = p.parse_all(["c;x", "a;y", "b;z"]).unwrap();
        let sources: Vec<_> = mappings.iter().map(|m| m.source().to_path_buf()).collect();
        assert_eq!(
            sources,
            vec![PathBuf::from("c"), PathBuf::from("a"), PathBuf::from("b")]
        );
    }

    #[test]
    fn test_effective_mappings_last_wins() {
        let mappings = vec![
            PathMapping::new("old", "data"),
            PathMapping::new("icons", "icons"),
            PathMapping::new("new", "data"),
        ];

        let effective = effective_mappings(&mappings);
        assert_eq!(effective.len(), 2);
        assert_eq!(effective[0].source(), Path::new("icons"));
        assert_eq!(effective[1].source(), Path::new("new"));
    }

    #[test]
    fn test_to_token() {
        let m = PathMapping::new("src/assets", "assets");
        assert_eq!(m.to_token(MappingSeparator::Equals), "src/assets=assets");
        assert_eq!(m.to_token(MappingSeparator::Semicolon), "src/assets;assets");
    }
}
