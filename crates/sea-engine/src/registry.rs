//! Namespace registry.
//!
//! Maps file paths to logical namespaces using glob rules read from a
//! `.sea-registry.toml` file:
//!
//! ```toml
//! version = 1
//! default_namespace = "default"
//!
//! [[namespaces]]
//! namespace = "logistics"
//! patterns = ["domains/logistics/**/*.sea"]
//! ```
//!
//! Patterns are matched against paths relative to the directory holding the
//! file, with `/` separators. `*` stays within one path segment and `**`
//! crosses segments. When several patterns match, the one with the longest
//! literal prefix wins; a tie between namespaces goes to the alphabetically
//! first name, or fails when the caller asks for ambiguity errors.

use crate::error::{Result, SeaError};
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File name looked up by [`NamespaceRegistry::discover`].
pub const REGISTRY_FILE: &str = ".sea-registry.toml";

const SUPPORTED_VERSION: u32 = 1;

fn default_namespace() -> String {
    "default".to_string()
}

/// One `[[namespaces]]` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRule {
    pub namespace: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    version: u32,
    #[serde(default = "default_namespace")]
    default_namespace: String,
    #[serde(default)]
    namespaces: Vec<NamespaceRule>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    namespace: String,
    matcher: GlobMatcher,
    /// Length of the pattern text before its first glob metacharacter.
    prefix_len: usize,
}

/// A file and the namespace it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    pub path: PathBuf,
    pub namespace: String,
}

/// Loaded namespace rules, rooted at the directory of their file.
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    root: PathBuf,
    default_namespace: String,
    rules: Vec<NamespaceRule>,
    patterns: Vec<CompiledPattern>,
}

impl NamespaceRegistry {
    /// Loads a registry file. Its parent directory becomes the root.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SeaError::io(path, e))?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::from_toml_str(&text, root)
    }

    /// Parses registry rules from TOML text.
    pub fn from_toml_str(content: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)?;
        if file.version != SUPPORTED_VERSION {
            return Err(SeaError::Registry(format!(
                "unsupported registry version {} (expected {})",
                file.version, SUPPORTED_VERSION
            )));
        }
        if file.default_namespace.trim().is_empty() {
            return Err(SeaError::Registry("default_namespace is empty".to_string()));
        }

        let mut patterns = Vec::new();
        for rule in &file.namespaces {
            if rule.namespace.trim().is_empty() {
                return Err(SeaError::Registry("rule with an empty namespace".to_string()));
            }
            if rule.patterns.is_empty() {
                return Err(SeaError::Registry(format!(
                    "namespace '{}' has no patterns",
                    rule.namespace
                )));
            }
            for pattern in &rule.patterns {
                let matcher = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()?
                    .compile_matcher();
                patterns.push(CompiledPattern {
                    namespace: rule.namespace.clone(),
                    matcher,
                    prefix_len: literal_prefix_len(pattern),
                });
            }
        }

        Ok(Self {
            root: root.into(),
            default_namespace: file.default_namespace,
            rules: file.namespaces,
            patterns,
        })
    }

    /// Looks for a registry file in `start` and its ancestors.
    pub fn discover(start: impl AsRef<Path>) -> Result<Option<Self>> {
        let start = start.as_ref();
        let dir = if start.is_file() {
            start.parent().unwrap_or(start)
        } else {
            start
        };
        for candidate in dir.ancestors() {
            let file = candidate.join(REGISTRY_FILE);
            if file.is_file() {
                debug!(path = %file.display(), "found namespace registry");
                return Self::from_file(file).map(Some);
            }
        }
        Ok(None)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn rules(&self) -> &[NamespaceRule] {
        &self.rules
    }

    /// Path relative to the root, `/`-separated.
    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let text = rel.to_string_lossy().replace('\\', "/");
        text.trim_start_matches("./").to_string()
    }

    /// Resolves the namespace of `path` (absolute, or relative to the root).
    pub fn namespace_for(&self, path: impl AsRef<Path>, fail_on_ambiguous: bool) -> Result<String> {
        let rel = self.relative(path.as_ref());
        self.resolve_relative(&rel, fail_on_ambiguous)
    }

    fn resolve_relative(&self, rel: &str, fail_on_ambiguous: bool) -> Result<String> {
        let matches: Vec<&CompiledPattern> = self
            .patterns
            .iter()
            .filter(|p| p.matcher.is_match(rel))
            .collect();

        let best = match matches.iter().map(|p| p.prefix_len).max() {
            Some(best) => best,
            None => return Ok(self.default_namespace.clone()),
        };

        let mut candidates: Vec<String> = matches
            .iter()
            .filter(|p| p.prefix_len == best)
            .map(|p| p.namespace.clone())
            .collect();
        candidates.sort();
        candidates.dedup();

        if candidates.len() > 1 {
            if fail_on_ambiguous {
                return Err(SeaError::Ambiguity {
                    path: rel.to_string(),
                    candidates,
                });
            }
            debug!(path = rel, ?candidates, "namespace tie broken alphabetically");
        }
        Ok(candidates.swap_remove(0))
    }

    /// Every file under the root matched by some rule, in path order.
    pub fn resolve_files(&self, fail_on_ambiguous: bool) -> Result<Vec<NamespaceBinding>> {
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = self.relative(entry.path());
            if self.patterns.iter().any(|p| p.matcher.is_match(&rel)) {
                files.push((rel, entry.into_path()));
            }
        }
        files.sort();

        files
            .into_iter()
            .map(|(rel, path)| {
                let namespace = self.resolve_relative(&rel, fail_on_ambiguous)?;
                Ok(NamespaceBinding { path, namespace })
            })
            .collect()
    }
}

/// Characters before the first glob metacharacter.
fn literal_prefix_len(pattern: &str) -> usize {
    pattern
        .find(['*', '?', '[', '{'])
        .unwrap_or(pattern.len())
}
