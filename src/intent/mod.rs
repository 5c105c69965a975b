//! Weighted keyword intent detection.
//!
//! Each bucket scores `matched weight / total weight`, counting a category
//! once no matter how many of its patterns hit. The decision rule:
//!
//! 1. `general` if `general > rag` and `general > threshold`
//! 2. else `rag` if `rag > threshold`
//! 3. else `unknown` with the larger of the two scores
//!
//! A tie above the threshold falls through to `rag`.

pub mod patterns;

pub use patterns::{CategorySpec, IntentTables};

use crate::config::IntentConfig;
use crate::error::{RagchatError, Result};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    General,
    Rag,
    Unknown,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::General => "general",
            IntentType::Rag => "rag",
            IntentType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent_type: IntentType,
    /// In [0, 1]
    pub confidence: f32,
    /// Last matching category of the winning bucket, or "unknown"
    pub matched_category: String,
    pub matched_patterns: Vec<String>,
    pub question_length: usize,
    pub word_count: usize,
}

/// Outcome of `should_use_rag`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagDecision {
    pub use_rag: bool,
    pub intent: IntentResult,
    pub threshold_used: f32,
}

struct Category {
    name: String,
    weight: f32,
    patterns: Vec<(String, Regex)>,
}

impl Category {
    /// First matching pattern, if any
    fn first_match(&self, message: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(message))
            .map(|(raw, _)| raw.as_str())
    }
}

struct Bucket {
    categories: Vec<Category>,
    total_weight: f32,
}

impl Bucket {
    fn compile(specs: &[CategorySpec]) -> Result<Self> {
        let mut categories = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut patterns = Vec::with_capacity(spec.patterns.len());
            for raw in &spec.patterns {
                let re = RegexBuilder::new(raw).case_insensitive(true).build().map_err(|e| {
                    RagchatError::Config(format!("Bad intent pattern {:?} in {}: {}", raw, spec.name, e))
                })?;
                patterns.push((raw.clone(), re));
            }
            categories.push(Category {
                name: spec.name.clone(),
                weight: spec.weight,
                patterns,
            });
        }
        let total_weight = categories.iter().map(|c| c.weight).sum();
        Ok(Bucket {
            categories,
            total_weight,
        })
    }

    fn score(&self, message: &str) -> f32 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let matched: f32 = self
            .categories
            .iter()
            .filter(|c| c.first_match(message).is_some())
            .map(|c| c.weight)
            .sum();
        matched / self.total_weight
    }

    /// (last matching category, first matching pattern of each category)
    fn details(&self, message: &str) -> (String, Vec<String>) {
        let mut category = "unknown".to_string();
        let mut found = Vec::new();
        for c in &self.categories {
            if let Some(pattern) = c.first_match(message) {
                found.push(pattern.to_string());
                category = c.name.clone();
            }
        }
        (category, found)
    }

    fn names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }
}

/// Pure, synchronous classifier; cheap to share behind an `Arc`
pub struct IntentDetector {
    general: Bucket,
    rag: Bucket,
    decision_threshold: f32,
    min_confidence: f32,
}

impl IntentDetector {
    pub fn new(tables: &IntentTables, decision_threshold: f32, min_confidence: f32) -> Result<Self> {
        Ok(Self {
            general: Bucket::compile(&tables.general)?,
            rag: Bucket::compile(&tables.rag)?,
            decision_threshold,
            min_confidence,
        })
    }

    /// Built-in tables with the default 0.3 thresholds
    pub fn builtin() -> Result<Self> {
        Self::new(&IntentTables::builtin(), 0.3, 0.3)
    }

    pub fn from_config(config: &IntentConfig) -> Result<Self> {
        let tables = match &config.patterns_file {
            Some(path) => {
                log::info!("Loading intent patterns from {}", path.display());
                IntentTables::from_file(path)?
            }
            None => IntentTables::builtin(),
        };
        Self::new(&tables, config.decision_threshold, config.min_confidence)
    }

    /// Bucket scores `(general, rag)` for a message
    pub fn scores(&self, message: &str) -> (f32, f32) {
        let lowered = message.trim().to_lowercase();
        (self.general.score(&lowered), self.rag.score(&lowered))
    }

    pub fn detect_intent(&self, message: &str) -> IntentResult {
        let lowered = message.trim().to_lowercase();
        let general_score = self.general.score(&lowered);
        let rag_score = self.rag.score(&lowered);

        let (intent_type, confidence, (matched_category, matched_patterns)) =
            if general_score > rag_score && general_score > self.decision_threshold {
                (IntentType::General, general_score, self.general.details(&lowered))
            } else if rag_score > self.decision_threshold {
                (IntentType::Rag, rag_score, self.rag.details(&lowered))
            } else {
                (
                    IntentType::Unknown,
                    general_score.max(rag_score),
                    ("unknown".to_string(), Vec::new()),
                )
            };

        IntentResult {
            intent_type,
            confidence,
            matched_category,
            matched_patterns,
            question_length: lowered.chars().count(),
            word_count: lowered.split_whitespace().count(),
        }
    }

    /// True only for a `rag` intent with confidence at or above `min_confidence`
    pub fn should_use_rag_with(&self, message: &str, min_confidence: f32) -> RagDecision {
        let intent = self.detect_intent(message);
        RagDecision {
            use_rag: intent.intent_type == IntentType::Rag && intent.confidence >= min_confidence,
            intent,
            threshold_used: min_confidence,
        }
    }

    /// `should_use_rag_with` at the configured minimum confidence
    pub fn should_use_rag(&self, message: &str) -> RagDecision {
        self.should_use_rag_with(message, self.min_confidence)
    }

    pub fn general_categories(&self) -> Vec<String> {
        self.general.names()
    }

    pub fn rag_categories(&self) -> Vec<String> {
        self.rag.names()
    }
}
