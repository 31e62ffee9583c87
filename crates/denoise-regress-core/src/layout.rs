//! Baseline tree naming
//!
//! ```text
//! <baseline_dir>/<dataset>/<image>.input.<featureExt>.pfm
//! <baseline_dir>/<dataset>/<image>.<resultName>.<mainFeatureExt>.pfm
//! ```

use std::path::{Path, PathBuf};

pub fn dataset_dir(root: &Path, dataset: &str) -> PathBuf {
    root.join(dataset)
}

/// Suffix shared by every converted input of one feature extension.
pub fn input_suffix(extension: &str) -> String {
    format!(".input.{extension}.pfm")
}

pub fn input_path(dataset_dir: &Path, image: &str, extension: &str) -> PathBuf {
    dataset_dir.join(format!("{image}{}", input_suffix(extension)))
}

pub fn reference_path(
    dataset_dir: &Path,
    image: &str,
    result_name: &str,
    main_extension: &str,
) -> PathBuf {
    dataset_dir.join(format!("{image}.{result_name}.{main_extension}.pfm"))
}
