//! Conventional commit classification.
//!
//! Messages are parsed with the `git-conventional` crate. A `type!:` header is
//! detected up front with a regex so that breaking markers are honoured even
//! when the rest of the message is not strictly conventional. When the body
//! does not follow the blank-line layout (squash merges), only the header is
//! parsed and `BREAKING CHANGE:` lines are found by scanning the body.

use crate::bump::BumpSeverity;
use crate::config::PresetConfig;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Structured view of a commit header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDescriptor {
    /// The commit type (feat, fix, chore, etc.)
    pub commit_type: String,
    /// Optional scope
    pub scope: Option<String>,
    /// Whether this is a breaking change
    pub breaking: bool,
}

fn breaking_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^(\w+)(?:\(([^)]*)\))?!:\s*.+").expect("breaking header pattern compiles")
    })
}

fn breaking_note() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"(?m)^BREAKING[ -]CHANGE:").expect("breaking note pattern compiles")
    })
}

/// Parse a commit message. Returns `None` for messages that are not
/// conventional commits.
#[must_use]
pub fn parse_commit_message(message: &str) -> Option<CommitDescriptor> {
    let message = message.trim();
    let header = message.lines().next().unwrap_or_default().trim();

    if let Some(caps) = breaking_header().captures(header) {
        return Some(CommitDescriptor {
            commit_type: caps[1].to_string(),
            scope: caps.get(2).map(|m| m.as_str().to_string()),
            breaking: true,
        });
    }

    let parsed = git_conventional::Commit::parse(message)
        .or_else(|_| git_conventional::Commit::parse(header))
        .ok()?;
    let commit_type = parsed.type_().to_string();
    if commit_type.is_empty() {
        return None;
    }

    let breaking = parsed.breaking()
        || parsed.footers().iter().any(|f| f.breaking())
        || breaking_note().is_match(message);

    Some(CommitDescriptor {
        commit_type,
        scope: parsed.scope().map(|s| s.to_string()),
        breaking,
    })
}

/// Table mapping commit types to bump severities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpPreset {
    table: BTreeMap<String, BumpSeverity>,
}

impl Default for BumpPreset {
    fn default() -> Self {
        Self::angular()
    }
}

impl BumpPreset {
    /// The Angular convention: features are minor, fixes and perf are patch.
    #[must_use]
    pub fn angular() -> Self {
        Self::from_table([
            ("feat", BumpSeverity::Minor),
            ("fix", BumpSeverity::Patch),
            ("perf", BumpSeverity::Patch),
        ])
    }

    /// Build a preset from `(type, severity)` pairs.
    #[must_use]
    pub fn from_table<'a>(entries: impl IntoIterator<Item = (&'a str, BumpSeverity)>) -> Self {
        Self {
            table: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Resolve the configured preset.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown preset names or invalid severities.
    pub fn from_config(config: &PresetConfig) -> Result<Self> {
        match config {
            PresetConfig::Named(name) if name == "angular" || name == "conventional" => {
                Ok(Self::angular())
            }
            PresetConfig::Named(name) => Err(Error::config(
                format!("Unknown commit preset '{name}'"),
                "Use \"angular\" or an object mapping commit types to bump types",
            )),
            PresetConfig::Custom(map) => {
                let mut table = BTreeMap::new();
                for (commit_type, severity) in map {
                    table.insert(commit_type.clone(), severity.parse()?);
                }
                Ok(Self { table })
            }
        }
    }

    /// Severity for a parsed commit. Breaking changes are always major.
    #[must_use]
    pub fn severity(&self, commit: &CommitDescriptor) -> BumpSeverity {
        if commit.breaking {
            return BumpSeverity::Major;
        }
        self.table
            .get(&commit.commit_type)
            .copied()
            .unwrap_or(BumpSeverity::None)
    }

    /// Severity for a raw message; unparsable messages yield `None`.
    #[must_use]
    pub fn classify(&self, message: &str) -> Option<BumpSeverity> {
        parse_commit_message(message).map(|c| self.severity(&c))
    }

    /// Highest severity across messages. Unparsable messages are skipped.
    #[must_use]
    pub fn aggregate<'a>(&self, messages: impl IntoIterator<Item = &'a str>) -> BumpSeverity {
        messages
            .into_iter()
            .filter_map(|m| self.classify(m))
            .fold(BumpSeverity::None, std::cmp::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let c = parse_commit_message("feat(api): add endpoint").unwrap();
        assert_eq!(c.commit_type, "feat");
        assert_eq!(c.scope.as_deref(), Some("api"));
        assert!(!c.breaking);
    }

    #[test]
    fn test_parse_bang_header() {
        let c = parse_commit_message("feat!: remove deprecated API").unwrap();
        assert_eq!(c.commit_type, "feat");
        assert!(c.breaking);

        let c = parse_commit_message("refactor(core)!: drop node 16").unwrap();
        assert_eq!(c.commit_type, "refactor");
        assert_eq!(c.scope.as_deref(), Some("core"));
        assert!(c.breaking);
    }

    #[test]
    fn test_parse_breaking_footer() {
        let c = parse_commit_message("feat: new config\n\nBREAKING CHANGE: old keys removed")
            .unwrap();
        assert!(c.breaking);
    }

    #[test]
    fn test_parse_body_without_blank_line() {
        let c = parse_commit_message("feat: add thing\nmore details without blank line").unwrap();
        assert_eq!(c.commit_type, "feat");
        assert!(!c.breaking);

        let c = parse_commit_message("fix(core): squash merge (#12)\n* fix one\n* fix two")
            .unwrap();
        assert_eq!(c.commit_type, "fix");
        assert_eq!(c.scope.as_deref(), Some("core"));
    }

    #[test]
    fn test_parse_breaking_note_inside_body() {
        let c = parse_commit_message("feat: x\n\nSome body text\nBREAKING CHANGE: removed y")
            .unwrap();
        assert!(c.breaking);

        let c = parse_commit_message("fix: y (#3)\n* cleanup\nBREAKING-CHANGE: dropped z").unwrap();
        assert!(c.breaking);

        let c = parse_commit_message("fix: y\n\nmentions BREAKING CHANGE: mid-line").unwrap();
        assert!(!c.breaking);
    }

    #[test]
    fn test_parse_non_conventional() {
        assert!(parse_commit_message("Merge branch 'main' into dev").is_none());
        assert!(parse_commit_message("update readme").is_none());
        assert!(parse_commit_message("").is_none());
    }

    #[test]
    fn test_breaking_syntax_is_commutative() {
        let preset = BumpPreset::angular();
        assert_eq!(preset.classify("fix!: x"), Some(BumpSeverity::Major));
        assert_eq!(
            preset.classify("fix: x\n\nBREAKING CHANGE: y"),
            Some(BumpSeverity::Major)
        );
    }

    #[test]
    fn test_squash_merge_classification() {
        let preset = BumpPreset::angular();
        assert_eq!(
            preset.classify("fix: squash merge (#12)\n* fix one\n* fix two"),
            Some(BumpSeverity::Patch)
        );
        assert_eq!(
            preset.classify("feat: x\n\nSome body text\nBREAKING CHANGE: removed y"),
            Some(BumpSeverity::Major)
        );
    }

    #[test]
    fn test_angular_table() {
        let preset = BumpPreset::angular();
        assert_eq!(preset.classify("feat: a"), Some(BumpSeverity::Minor));
        assert_eq!(preset.classify("fix: a"), Some(BumpSeverity::Patch));
        assert_eq!(preset.classify("perf: a"), Some(BumpSeverity::Patch));
        assert_eq!(preset.classify("chore: a"), Some(BumpSeverity::None));
        assert_eq!(preset.classify("nonsense"), None);
    }

    #[test]
    fn test_custom_table_from_config() {
        let mut map = BTreeMap::new();
        map.insert("fix".to_string(), "minor".to_string());
        map.insert("docs".to_string(), "patch".to_string());
        let preset = BumpPreset::from_config(&PresetConfig::Custom(map)).unwrap();
        assert_eq!(preset.classify("fix: a"), Some(BumpSeverity::Minor));
        assert_eq!(preset.classify("docs: a"), Some(BumpSeverity::Patch));
        assert_eq!(preset.classify("feat: a"), Some(BumpSeverity::None));
    }

    #[test]
    fn test_unknown_named_preset() {
        let err = BumpPreset::from_config(&PresetConfig::Named("gitmoji".into())).unwrap_err();
        assert!(err.to_string().contains("gitmoji"));
    }

    #[test]
    fn test_aggregate_is_maximum() {
        let preset = BumpPreset::angular();
        let bump = preset.aggregate(["fix: a", "feat: b", "chore: c", "garbage"]);
        assert_eq!(bump, BumpSeverity::Minor);
    }

    #[test]
    fn test_aggregate_none_when_nothing_maps() {
        let preset = BumpPreset::angular();
        assert_eq!(preset.aggregate(["chore: a", "not conventional"]), BumpSeverity::None);
        assert_eq!(preset.aggregate(std::iter::empty()), BumpSeverity::None);
    }
}
