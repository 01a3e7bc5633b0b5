//! Status classification
//!
//! Maps raw backend status names onto semantic buckets ("Backlog",
//! "In Progress", "Done", ...) through an ordered rule list: first match
//! wins. Rule precedence is a user-visible contract, so rules are kept as an
//! explicit ordered list rather than a map with undefined iteration order.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeline::StatusInterval;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("status {status:?} matches no classification rule and no default bucket is configured")]
    UnclassifiedStatus { status: String },
    #[error("invalid classification pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("{role} bucket {bucket:?} is not produced by any rule or the default")]
    UnknownBucket { bucket: String, role: &'static str },
}

/// One ordered classification rule. `pattern` is a case-insensitive exact
/// status name unless `regex` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
    pub bucket: String,
}

impl ClassificationRule {
    pub fn exact(pattern: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex: false,
            bucket: bucket.into(),
        }
    }

    pub fn matching(pattern: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex: true,
            bucket: bucket.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Ordered rules; earlier rules take precedence.
    pub rules: Vec<ClassificationRule>,
    /// Bucket for statuses no rule matches. Without one, an unmatched status
    /// is a fatal configuration gap.
    pub default_bucket: Option<String>,
    /// Buckets that count toward in-progress elapsed time.
    pub in_progress_buckets: Vec<String>,
    /// Buckets that mean the work is done.
    pub terminal_buckets: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                ClassificationRule::exact("To Do", "Backlog"),
                ClassificationRule::exact("Open", "Backlog"),
                ClassificationRule::exact("Backlog", "Backlog"),
                ClassificationRule::exact("In Progress", "In Progress"),
                ClassificationRule::matching("(?i)review", "In Progress"),
                ClassificationRule::exact("Done", "Done"),
                ClassificationRule::exact("Closed", "Done"),
                ClassificationRule::exact("Resolved", "Done"),
            ],
            default_bucket: None,
            in_progress_buckets: vec!["In Progress".to_string()],
            terminal_buckets: vec!["Done".to_string()],
        }
    }
}

/// A status interval annotated with its semantic bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedInterval {
    pub interval: StatusInterval,
    pub bucket: String,
    /// Whether the bucket counts toward in-progress elapsed-time metrics.
    pub in_progress: bool,
}

#[derive(Debug, Clone)]
enum CompiledPattern {
    Exact(String),
    Pattern(Regex),
}

impl CompiledPattern {
    fn matches(&self, status: &str) -> bool {
        match self {
            CompiledPattern::Exact(name) => name.eq_ignore_ascii_case(status),
            CompiledPattern::Pattern(re) => re.is_match(status),
        }
    }
}

/// Compiled classifier. Construction compiles every regex and checks that
/// every bucket the configuration refers to can actually be produced, so
/// configuration gaps surface before any per-item processing starts. A
/// typo'd terminal bucket would otherwise silently invalidate every lead
/// and cycle result.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    rules: Vec<(CompiledPattern, String)>,
    default_bucket: Option<String>,
    in_progress: HashSet<String>,
    terminal: HashSet<String>,
}

impl StatusClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self, ClassifyError> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let pattern = if rule.regex {
                let re = Regex::new(&rule.pattern).map_err(|source| {
                    ClassifyError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    }
                })?;
                CompiledPattern::Pattern(re)
            } else {
                CompiledPattern::Exact(rule.pattern.clone())
            };
            rules.push((pattern, rule.bucket.clone()));
        }

        let mut produced: HashSet<&str> =
            config.rules.iter().map(|r| r.bucket.as_str()).collect();
        if let Some(default) = &config.default_bucket {
            produced.insert(default.as_str());
        }
        for bucket in &config.in_progress_buckets {
            if !produced.contains(bucket.as_str()) {
                return Err(ClassifyError::UnknownBucket {
                    bucket: bucket.clone(),
                    role: "in-progress",
                });
            }
        }
        for bucket in &config.terminal_buckets {
            if !produced.contains(bucket.as_str()) {
                return Err(ClassifyError::UnknownBucket {
                    bucket: bucket.clone(),
                    role: "terminal",
                });
            }
        }

        Ok(Self {
            rules,
            default_bucket: config.default_bucket.clone(),
            in_progress: config.in_progress_buckets.iter().cloned().collect(),
            terminal: config.terminal_buckets.iter().cloned().collect(),
        })
    }

    /// Resolve one status name to its bucket; first matching rule wins.
    pub fn classify(&self, status: &str) -> Result<&str, ClassifyError> {
        for (pattern, bucket) in &self.rules {
            if pattern.matches(status) {
                return Ok(bucket);
            }
        }
        self.default_bucket
            .as_deref()
            .ok_or_else(|| ClassifyError::UnclassifiedStatus {
                status: status.to_string(),
            })
    }

    pub fn is_in_progress(&self, bucket: &str) -> bool {
        self.in_progress.contains(bucket)
    }

    pub fn is_terminal(&self, bucket: &str) -> bool {
        self.terminal.contains(bucket)
    }

    /// Classify every interval of a reconstructed timeline.
    pub fn classify_intervals(
        &self,
        intervals: &[StatusInterval],
    ) -> Result<Vec<ClassifiedInterval>, ClassifyError> {
        intervals
            .iter()
            .map(|interval| {
                let bucket = self.classify(&interval.status)?.to_string();
                let in_progress = self.is_in_progress(&bucket);
                Ok(ClassifiedInterval {
                    interval: interval.clone(),
                    bucket,
                    in_progress,
                })
            })
            .collect()
    }
}
