//! Feature tokens, their aliases, and feature-set declarations
//!
//! A feature token names one input channel of a denoising invocation
//! (`hdr`, `ldr`, `alb`, `nrm`, `calb`, `cnrm`, `dir`). The denoiser option and
//! the baseline file extension for a token may differ from the token itself:
//!
//! | token  | option | extension |
//! |--------|--------|-----------|
//! | `calb` | `alb`  | `alb`     |
//! | `cnrm` | `nrm`  | `nrm`     |
//! | `dir`  | `dir`  | `sh1x`    |
//!
//! Every other token maps to itself.

use crate::error::{RegressError, Result};
use crate::model::Filter;
use serde::Deserialize;

/// Tokens that request the denoiser's clean auxiliary mode.
const CLEAN_AUX_FEATURES: [&str; 2] = ["calb", "cnrm"];

/// Denoiser command-line option name for a feature token.
pub fn resolve_option(token: &str) -> &str {
    match token {
        "calb" => "alb",
        "cnrm" => "nrm",
        other => other,
    }
}

/// Baseline file extension token for a feature token.
pub fn resolve_extension(token: &str) -> &str {
    match token {
        "dir" => "sh1x",
        other => resolve_option(other),
    }
}

/// An ordered, non-empty list of feature tokens plus its matrix breadth.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFeatureSet")]
pub struct FeatureSet {
    features: Vec<String>,
    full_test: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeatureSet {
    features: Vec<String>,
    #[serde(default)]
    full: bool,
}

impl TryFrom<RawFeatureSet> for FeatureSet {
    type Error = RegressError;

    fn try_from(raw: RawFeatureSet) -> Result<Self> {
        FeatureSet::new(raw.features, raw.full)
    }
}

impl FeatureSet {
    pub fn new<I, S>(features: I, full_test: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let features: Vec<String> = features.into_iter().map(Into::into).collect();
        if features.is_empty() {
            return Err(RegressError::InvalidFeatureSet(
                "a feature set needs at least one feature".to_string(),
            ));
        }
        if let Some(bad) = features
            .iter()
            .find(|f| f.is_empty() || !f.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(RegressError::InvalidFeatureSet(format!(
                "malformed feature token {bad:?}"
            )));
        }
        Ok(Self {
            features,
            full_test,
        })
    }

    /// Built-in declarations, known to be well formed.
    pub(crate) fn declared(features: &[&str], full_test: bool) -> Self {
        debug_assert!(!features.is_empty());
        Self {
            features: features.iter().map(|f| f.to_string()).collect(),
            full_test,
        }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn full_test(&self) -> bool {
        self.full_test
    }

    /// The first token; its extension keys image discovery and the reference file.
    pub fn main_feature(&self) -> &str {
        &self.features[0]
    }

    pub fn main_extension(&self) -> &str {
        resolve_extension(self.main_feature())
    }

    /// Underscore-joined tokens, e.g. `hdr_alb`.
    pub fn features_str(&self) -> String {
        self.features.join("_")
    }

    /// Key naming the reference files of this set, e.g. `rt_hdr_alb`.
    ///
    /// Baseline generation writes under this name and run mode reads it back,
    /// so both sides must go through here.
    pub fn result_name(&self, filter: Filter) -> String {
        format!("{}_{}", filter.result_prefix(), self.features_str())
    }

    pub fn needs_clean_aux(&self) -> bool {
        self.features
            .iter()
            .any(|f| CLEAN_AUX_FEATURES.contains(&f.as_str()))
    }
}
