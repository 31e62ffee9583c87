//! Harness configuration and regression suite declarations.

use crate::error::{RegressError, Result};
use crate::features::FeatureSet;
use crate::model::{Arch, Filter, Mode};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Version tag of the baseline file layout
pub const BASELINE_VERSION: &str = "v2.1.0";

/// Extension of the raw images converted in baseline mode
pub const DEFAULT_RAW_EXTENSION: &str = "exr";

/// Memory cap (MB) exercised by full matrices
pub const MAX_MEMORY_MB: u32 = 200;

/// A filter, the dataset it is checked against, and its feature sets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    pub filter: Filter,
    pub dataset: String,
    #[serde(rename = "feature_set")]
    pub feature_sets: Vec<FeatureSet>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteFile {
    #[serde(rename = "suite", default)]
    suites: Vec<Suite>,
}

/// Everything a harness invocation needs, resolved up front by the caller.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub mode: Mode,
    /// Device passed to the binaries; `None` leaves the library default.
    pub device: Option<String>,
    pub arch: Arch,
    pub minimal: bool,
    pub full: bool,
    pub log: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub baseline_dir: PathBuf,
    /// Directory holding `convert_image.py` and `infer.py`
    pub tools_dir: PathBuf,
    /// Directory holding `oidnTest`, `oidnBenchmark` and `oidnDenoise`
    pub bin_dir: PathBuf,
    /// Instruction-set emulator program
    pub emulator: PathBuf,
    /// Interpreter for the tool scripts; `None` executes them directly.
    pub interpreter: Option<PathBuf>,
    /// Filters to exercise; empty selects every suite.
    pub filters: Vec<Filter>,
    pub raw_extension: String,
    pub suites: Vec<Suite>,
}

impl HarnessConfig {
    /// Configuration rooted at `root` with the stock directory layout and suites.
    pub fn new(mode: Mode, root: &Path) -> Self {
        let training_dir = root.join("training");
        Self {
            mode,
            device: None,
            arch: Arch::Native,
            minimal: false,
            full: false,
            log: None,
            data_dir: training_dir.join("data"),
            results_dir: training_dir.join("results"),
            baseline_dir: training_dir.join(format!("baseline_{BASELINE_VERSION}")),
            tools_dir: training_dir,
            bin_dir: root.join("build"),
            emulator: PathBuf::from(default_emulator()),
            interpreter: None,
            filters: Vec::new(),
            raw_extension: DEFAULT_RAW_EXTENSION.to_string(),
            suites: default_suites(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.minimal && self.full {
            return Err(RegressError::ConflictingModes);
        }
        Ok(())
    }

    /// Suites whose filter is selected, in declaration order.
    pub fn selected_suites(&self) -> impl Iterator<Item = &Suite> {
        self.suites
            .iter()
            .filter(|suite| self.filters.is_empty() || self.filters.contains(&suite.filter))
    }
}

/// Emulator executable name for the host platform
pub fn default_emulator() -> &'static str {
    if cfg!(windows) {
        "sde.exe"
    } else {
        "sde64"
    }
}

/// The stock regression suites.
pub fn default_suites() -> Vec<Suite> {
    fn set(features: &[&str], full: bool) -> FeatureSet {
        FeatureSet::declared(features, full)
    }

    vec![
        Suite {
            filter: Filter::Rt,
            dataset: "rt_regress".to_string(),
            feature_sets: vec![
                set(&["hdr", "alb", "nrm"], true),
                set(&["hdr", "alb"], false),
                set(&["hdr"], true),
                set(&["hdr", "calb", "cnrm"], false),
                set(&["ldr", "alb", "nrm"], false),
                set(&["ldr", "alb"], false),
                set(&["ldr"], true),
                set(&["ldr", "calb", "cnrm"], false),
                set(&["alb"], true),
                set(&["nrm"], true),
            ],
        },
        Suite {
            filter: Filter::RtLightmap,
            dataset: "rtlightmap_regress".to_string(),
            feature_sets: vec![set(&["hdr"], true), set(&["dir"], false)],
        },
    ]
}

pub fn default_suite_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "denoise-regress").map(|dirs| dirs.config_dir().join("suites.toml"))
}

/// Parse suite declarations from TOML text.
pub fn parse_suites(contents: &str, path: &Path) -> Result<Vec<Suite>> {
    let file: SuiteFile = toml::from_str(contents).map_err(|e| RegressError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if file.suites.is_empty() {
        return Err(RegressError::Config {
            path: path.to_path_buf(),
            message: "no [[suite]] tables declared".to_string(),
        });
    }
    Ok(file.suites)
}

/// Load suites from `path`, falling back to the stock suites if it does not exist.
pub fn load_suites(path: &Path) -> Result<Vec<Suite>> {
    if !path.exists() {
        return Ok(default_suites());
    }

    let contents = std::fs::read_to_string(path)?;
    parse_suites(&contents, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::new(Mode::Run, Path::new("/oidn"));
        assert_eq!(config.data_dir, Path::new("/oidn/training/data"));
        assert_eq!(
            config.baseline_dir,
            Path::new("/oidn/training/baseline_v2.1.0")
        );
        assert_eq!(config.tools_dir, Path::new("/oidn/training"));
        assert!(config.device.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_and_full_conflict() {
        let mut config = HarnessConfig::new(Mode::Run, Path::new("."));
        config.minimal = true;
        config.full = true;
        assert!(matches!(
            config.validate(),
            Err(RegressError::ConflictingModes)
        ));
    }

    #[test]
    fn test_default_suites() {
        let suites = default_suites();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].filter, Filter::Rt);
        assert_eq!(suites[0].feature_sets.len(), 10);
        assert_eq!(suites[1].dataset, "rtlightmap_regress");
        assert_eq!(suites[1].feature_sets[1].main_extension(), "sh1x");
    }

    #[test]
    fn test_selected_suites() {
        let mut config = HarnessConfig::new(Mode::Run, Path::new("."));
        assert_eq!(config.selected_suites().count(), 2);

        config.filters = vec![Filter::RtLightmap];
        let selected: Vec<_> = config.selected_suites().collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].filter, Filter::RtLightmap);
    }

    #[test]
    fn test_parse_suites() {
        let toml = r#"
            [[suite]]
            filter = "RT"
            dataset = "rt_small"

            [[suite.feature_set]]
            features = ["hdr", "alb"]
            full = true

            [[suite.feature_set]]
            features = ["ldr"]
        "#;
        let suites = parse_suites(toml, Path::new("suites.toml")).unwrap();
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].dataset, "rt_small");
        assert!(suites[0].feature_sets[0].full_test());
        assert!(!suites[0].feature_sets[1].full_test());
    }

    #[test]
    fn test_parse_suites_rejects_empty_feature_set() {
        let toml = r#"
            [[suite]]
            filter = "RT"
            dataset = "rt_small"

            [[suite.feature_set]]
            features = []
        "#;
        let err = parse_suites(toml, Path::new("suites.toml")).unwrap_err();
        assert!(matches!(err, RegressError::Config { .. }));
    }

    #[test]
    fn test_parse_suites_rejects_unknown_filter() {
        let toml = r#"
            [[suite]]
            filter = "Unknown"
            dataset = "x"
            feature_set = []
        "#;
        assert!(parse_suites(toml, Path::new("suites.toml")).is_err());
    }

    #[test]
    fn test_parse_suites_rejects_misspelled_keys() {
        let feature_set_typo = r#"
            [[suite]]
            filter = "RT"
            dataset = "x"

            [[suite.feature_set]]
            features = ["hdr"]
            full_test = true
        "#;
        let err = parse_suites(feature_set_typo, Path::new("suites.toml")).unwrap_err();
        assert!(matches!(err, RegressError::Config { .. }));
        assert!(err.to_string().contains("full_test"));

        let suite_typo = r#"
            [[suite]]
            filter = "RT"
            datset = "x"
            feature_set = []
        "#;
        assert!(matches!(
            parse_suites(suite_typo, Path::new("suites.toml")),
            Err(RegressError::Config { .. })
        ));

        let top_level_typo = r#"
            [[suites]]
            filter = "RT"
        "#;
        assert!(matches!(
            parse_suites(top_level_typo, Path::new("suites.toml")),
            Err(RegressError::Config { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let suites = load_suites(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(suites, default_suites());
    }

    #[test]
    fn test_load_suites_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("suites.toml");
        std::fs::write(
            &path,
            "[[suite]]\nfilter = \"RTLightmap\"\ndataset = \"lm\"\n\n[[suite.feature_set]]\nfeatures = [\"dir\"]\n",
        )
        .unwrap();
        let suites = load_suites(&path).unwrap();
        assert_eq!(suites[0].filter, Filter::RtLightmap);
        assert_eq!(suites[0].feature_sets[0].features(), ["dir".to_string()]);
    }
}
