//! Test matrix expansion
//!
//! A feature set expands into the Cartesian product
//! `quality × image × precision × in-place × max-memory`, iterated in that
//! order (quality outermost). Which values each axis takes depends on the
//! filter, the set's `full_test` flag and the global `full` switch:
//!
//! | axis       | narrow   | wide                  |
//! |------------|----------|-----------------------|
//! | quality    | `high`   | `high`, `balanced`    |
//! | precision  | `fp32`   | `fp32`, `fp16`        |
//! | in-place   | off      | off, on               |
//! | max-memory | none     | none, 200 MB          |
//!
//! Quality is wide for the beauty filter or under `full`; the other axes are
//! wide for full-test sets or under `full`.
//!
//! Cases are resolved lazily. A case whose feature inputs are not all in the
//! baseline is skipped; a case whose reference image is missing ends the
//! iteration with [`RegressError::MissingReferenceImage`].

use crate::config::{HarnessConfig, MAX_MEMORY_MB};
use crate::error::{RegressError, Result};
use crate::features::{resolve_extension, resolve_option, FeatureSet};
use crate::layout;
use crate::model::{Filter, Precision, Quality};
use crate::runner::CommandLine;
use crate::scan::{strip_name, BaselineFs};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Denoiser binary exercised by every case
pub const DENOISE_BINARY: &str = "oidnDenoise";

/// Values taken by each matrix axis for one feature set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixAxes {
    pub qualities: Vec<Quality>,
    pub precisions: Vec<Precision>,
    pub in_place: Vec<bool>,
    pub max_memory: Vec<Option<u32>>,
}

impl MatrixAxes {
    pub fn new(filter: Filter, set: &FeatureSet, full: bool) -> Self {
        let wide = set.full_test() || full;
        Self {
            qualities: if filter.is_beauty() || full {
                vec![Quality::High, Quality::Balanced]
            } else {
                vec![Quality::High]
            },
            precisions: if wide {
                vec![Precision::Fp32, Precision::Fp16]
            } else {
                vec![Precision::Fp32]
            },
            in_place: if wide { vec![false, true] } else { vec![false] },
            max_memory: if wide {
                vec![None, Some(MAX_MEMORY_MB)]
            } else {
                vec![None]
            },
        }
    }

    /// Number of cases produced per discovered image.
    pub fn cases_per_image(&self) -> usize {
        self.qualities.len() * self.precisions.len() * self.in_place.len() * self.max_memory.len()
    }
}

/// One resolved denoiser input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInput {
    pub option: String,
    pub path: PathBuf,
}

/// A single runnable denoiser invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub filter: Filter,
    pub quality: Quality,
    pub features_str: String,
    pub image: String,
    pub precision: Precision,
    pub in_place: bool,
    pub max_memory: Option<u32>,
    pub inputs: Vec<FeatureInput>,
    pub reference: PathBuf,
    pub clean_aux: bool,
}

impl TestCase {
    /// e.g. `RT.balanced.hdr_alb.img01.fp16.inplace.maxmem200`
    pub fn name(&self) -> String {
        let mut name = format!(
            "{}.{}.{}.{}.{}",
            self.filter,
            self.quality.as_str(),
            self.features_str,
            self.image,
            self.precision.as_str()
        );
        if self.in_place {
            name.push_str(".inplace");
        }
        if let Some(max_memory) = self.max_memory {
            name.push_str(&format!(".maxmem{max_memory}"));
        }
        name
    }

    pub fn command(&self, bin_dir: &Path, device: Option<&str>) -> CommandLine {
        let binary = bin_dir.join(format!("{DENOISE_BINARY}{}", std::env::consts::EXE_SUFFIX));
        let mut cmd = CommandLine::new(binary);
        if let Some(device) = device {
            cmd = cmd.args(["--device", device]);
        }
        cmd = cmd.args(["-f", self.filter.as_str(), "-q", self.quality.as_str()]);

        for input in &self.inputs {
            cmd = cmd
                .arg(format!("--{}", input.option))
                .arg(&input.path);
        }
        cmd = cmd
            .arg("--ref")
            .arg(&self.reference)
            .args(["-n", "3", "-v", "2"]);

        if self.clean_aux {
            cmd = cmd.arg("--clean_aux");
        }
        if self.precision == Precision::Fp16 {
            cmd = cmd.args(["-t", "half"]);
        }
        if self.in_place {
            cmd = cmd.arg("--inplace");
        }
        if let Some(max_memory) = self.max_memory {
            cmd = cmd.arg("--maxmem").arg(max_memory.to_string());
        }
        cmd
    }
}

/// Expands feature sets against the images present in a baseline tree.
pub struct MatrixGenerator<'a, F: BaselineFs + ?Sized> {
    fs: &'a F,
    baseline_dir: PathBuf,
    full: bool,
}

impl<'a, F: BaselineFs + ?Sized> MatrixGenerator<'a, F> {
    pub fn new(fs: &'a F, config: &HarnessConfig) -> Self {
        Self {
            fs,
            baseline_dir: config.baseline_dir.clone(),
            full: config.full,
        }
    }

    /// Images with a converted input for the set's main feature, sorted by path.
    pub fn discover_images(&self, dataset: &str, set: &FeatureSet) -> Result<Vec<String>> {
        let dataset_dir = layout::dataset_dir(&self.baseline_dir, dataset);
        let suffix = layout::input_suffix(set.main_extension());

        let images: Vec<String> = self
            .fs
            .find_with_suffix(&dataset_dir, &suffix)?
            .iter()
            .filter_map(|path| strip_name(&dataset_dir, path, &suffix))
            .collect();

        if images.is_empty() {
            return Err(RegressError::NoBaselineInputs {
                dir: dataset_dir,
                feature: set.main_feature().to_string(),
            });
        }
        debug!(
            "Found {} baseline images for {} in {}",
            images.len(),
            set.main_feature(),
            dataset_dir.display()
        );
        Ok(images)
    }

    /// Lazily resolved cases of `set`, in matrix order.
    pub fn expand(&self, filter: Filter, dataset: &str, set: &FeatureSet) -> Result<Cases<'a, F>> {
        let images = self.discover_images(dataset, set)?;
        let axes = MatrixAxes::new(filter, set, self.full);

        let mut combos = Vec::with_capacity(images.len() * axes.cases_per_image());
        for &quality in &axes.qualities {
            for image in 0..images.len() {
                for &precision in &axes.precisions {
                    for &in_place in &axes.in_place {
                        for &max_memory in &axes.max_memory {
                            combos.push(Combo {
                                quality,
                                image,
                                precision,
                                in_place,
                                max_memory,
                            });
                        }
                    }
                }
            }
        }

        Ok(Cases {
            fs: self.fs,
            dataset_dir: layout::dataset_dir(&self.baseline_dir, dataset),
            filter,
            set: set.clone(),
            result_name: set.result_name(filter),
            images,
            combos: combos.into_iter(),
            skipped: 0,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Combo {
    quality: Quality,
    image: usize,
    precision: Precision,
    in_place: bool,
    max_memory: Option<u32>,
}

/// Iterator over the cases of one feature set.
///
/// Yields at most one error, after which it is exhausted.
pub struct Cases<'a, F: BaselineFs + ?Sized> {
    fs: &'a F,
    dataset_dir: PathBuf,
    filter: Filter,
    set: FeatureSet,
    result_name: String,
    images: Vec<String>,
    combos: std::vec::IntoIter<Combo>,
    skipped: usize,
}

impl<F: BaselineFs + ?Sized> Cases<'_, F> {
    /// Cases dropped so far because a feature input was missing.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    fn resolve(&self, combo: Combo) -> Result<Option<TestCase>> {
        let image = &self.images[combo.image];

        let mut inputs = Vec::with_capacity(self.set.features().len());
        for feature in self.set.features() {
            let path = layout::input_path(&self.dataset_dir, image, resolve_extension(feature));
            if !self.fs.is_file(&path) {
                debug!(
                    "Skipping {}: {}",
                    image,
                    RegressError::MissingFeatureFile(path)
                );
                return Ok(None);
            }
            inputs.push(FeatureInput {
                option: resolve_option(feature).to_string(),
                path,
            });
        }

        let reference = layout::reference_path(
            &self.dataset_dir,
            image,
            &self.result_name,
            self.set.main_extension(),
        );
        if !self.fs.is_file(&reference) {
            return Err(RegressError::MissingReferenceImage(reference));
        }

        Ok(Some(TestCase {
            filter: self.filter,
            quality: combo.quality,
            features_str: self.set.features_str(),
            image: image.clone(),
            precision: combo.precision,
            in_place: combo.in_place,
            max_memory: combo.max_memory,
            inputs,
            reference,
            clean_aux: self.set.needs_clean_aux(),
        }))
    }
}

impl<F: BaselineFs + ?Sized> Iterator for Cases<'_, F> {
    type Item = Result<TestCase>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let combo = self.combos.next()?;
            match self.resolve(combo) {
                Ok(Some(case)) => return Some(Ok(case)),
                Ok(None) => self.skipped += 1,
                Err(err) => {
                    self.combos = Vec::new().into_iter();
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mode;
    use crate::scan::FileSetFs;

    const BASELINE: &str = "/baseline";

    fn config(full: bool) -> HarnessConfig {
        let mut config = HarnessConfig::new(Mode::Run, Path::new("/oidn"));
        config.baseline_dir = PathBuf::from(BASELINE);
        config.full = full;
        config
    }

    fn set(features: &[&str], full: bool) -> FeatureSet {
        FeatureSet::new(features.iter().copied(), full).unwrap()
    }

    /// Baseline holding every input and the reference of `set` for each image.
    fn populated(filter: Filter, dataset: &str, set: &FeatureSet, images: &[&str]) -> FileSetFs {
        let dir = Path::new(BASELINE).join(dataset);
        let mut fs = FileSetFs::default();
        for image in images {
            for feature in set.features() {
                fs.insert(layout::input_path(&dir, image, resolve_extension(feature)));
            }
            fs.insert(layout::reference_path(
                &dir,
                image,
                &set.result_name(filter),
                set.main_extension(),
            ));
        }
        fs
    }

    fn collect(cases: Cases<'_, FileSetFs>) -> Vec<TestCase> {
        cases.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_axes_narrow_lightmap() {
        let axes = MatrixAxes::new(Filter::RtLightmap, &set(&["dir"], false), false);
        assert_eq!(axes.qualities, [Quality::High]);
        assert_eq!(axes.precisions, [Precision::Fp32]);
        assert_eq!(axes.in_place, [false]);
        assert_eq!(axes.max_memory, [None]);
        assert_eq!(axes.cases_per_image(), 1);
    }

    #[test]
    fn test_axes_global_full_widens_everything() {
        let axes = MatrixAxes::new(Filter::RtLightmap, &set(&["dir"], false), true);
        assert_eq!(axes.qualities, [Quality::High, Quality::Balanced]);
        assert_eq!(axes.max_memory, [None, Some(200)]);
        assert_eq!(axes.cases_per_image(), 16);
    }

    #[test]
    fn test_minimal_matrix_one_case_per_image() {
        let hdr = set(&["hdr"], false);
        let fs = populated(Filter::RtLightmap, "lm", &hdr, &["a", "b", "c"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let cases = collect(generator.expand(Filter::RtLightmap, "lm", &hdr).unwrap());
        assert_eq!(cases.len(), 3);
        for case in &cases {
            assert_eq!(case.quality, Quality::High);
            assert_eq!(case.precision, Precision::Fp32);
            assert!(!case.in_place);
            assert_eq!(case.max_memory, None);
        }
    }

    #[test]
    fn test_full_test_matrix_size() {
        let hdr = set(&["hdr"], true);
        let fs = populated(Filter::RtLightmap, "lm", &hdr, &["a", "b"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let cases = collect(generator.expand(Filter::RtLightmap, "lm", &hdr).unwrap());
        assert_eq!(cases.len(), 2 * 2 * 2 * 2);
    }

    #[test]
    fn test_beauty_filter_end_to_end() {
        let hdr = set(&["hdr"], true);
        let fs = populated(Filter::Rt, "rt_regress", &hdr, &["img01"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let cases = collect(generator.expand(Filter::Rt, "rt_regress", &hdr).unwrap());
        assert_eq!(cases.len(), 16);

        for case in &cases {
            assert_eq!(
                case.reference,
                Path::new("/baseline/rt_regress/img01.rt_hdr.hdr.pfm")
            );
            let text = case.command(Path::new("/bin"), None).to_string();
            assert!(text.starts_with(&format!(
                "/bin/oidnDenoise{} -f RT -q {} --hdr /baseline/rt_regress/img01.input.hdr.pfm",
                std::env::consts::EXE_SUFFIX,
                case.quality.as_str()
            )));
        }

        // Quality is the outermost axis, max-memory the innermost.
        assert!(cases[..8].iter().all(|c| c.quality == Quality::High));
        assert!(cases[8..].iter().all(|c| c.quality == Quality::Balanced));
        assert_eq!(cases[0].max_memory, None);
        assert_eq!(cases[1].max_memory, Some(200));
        assert!(!cases[1].in_place && cases[2].in_place);
        assert_eq!(cases[4].precision, Precision::Fp16);
    }

    #[test]
    fn test_image_order_within_quality() {
        let hdr = set(&["hdr"], false);
        let fs = populated(Filter::Rt, "rt", &hdr, &["b", "a"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let names: Vec<String> = collect(generator.expand(Filter::Rt, "rt", &hdr).unwrap())
            .iter()
            .map(TestCase::name)
            .collect();
        assert_eq!(
            names,
            [
                "RT.high.hdr.a.fp32",
                "RT.high.hdr.b.fp32",
                "RT.balanced.hdr.a.fp32",
                "RT.balanced.hdr.b.fp32",
            ]
        );
    }

    #[test]
    fn test_no_baseline_inputs_is_fatal() {
        let fs = FileSetFs::default();
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let err = generator
            .expand(Filter::Rt, "rt_regress", &set(&["hdr"], false))
            .err()
            .unwrap();
        assert!(matches!(err, RegressError::NoBaselineInputs { .. }));
    }

    #[test]
    fn test_missing_feature_file_skips_only_that_image() {
        let hdr_alb = set(&["hdr", "alb"], false);
        let mut fs = populated(Filter::Rt, "rt", &hdr_alb, &["a", "b"]);
        let dir = Path::new(BASELINE).join("rt");
        assert!(fs.remove(&layout::input_path(&dir, "a", "alb")));

        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);
        let mut cases = generator.expand(Filter::Rt, "rt", &hdr_alb).unwrap();

        let mut emitted = Vec::new();
        for case in cases.by_ref() {
            emitted.push(case.unwrap());
        }
        assert_eq!(emitted.len(), 2);
        assert!(emitted.iter().all(|c| c.image == "b"));
        assert_eq!(cases.skipped(), 2);
    }

    #[test]
    fn test_missing_reference_stops_iteration() {
        let hdr = set(&["hdr"], false);
        let mut fs = populated(Filter::Rt, "rt", &hdr, &["a", "b"]);
        let dir = Path::new(BASELINE).join("rt");
        assert!(fs.remove(&layout::reference_path(&dir, "b", "rt_hdr", "hdr")));

        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);
        let mut cases = generator.expand(Filter::Rt, "rt", &hdr).unwrap();

        assert_eq!(cases.next().unwrap().unwrap().image, "a");
        assert!(matches!(
            cases.next(),
            Some(Err(RegressError::MissingReferenceImage(_)))
        ));
        assert!(cases.next().is_none());
    }

    #[test]
    fn test_aliased_features_resolve_paths_and_options() {
        let clean = set(&["hdr", "calb", "cnrm"], false);
        let fs = populated(Filter::Rt, "rt", &clean, &["img"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let case = collect(generator.expand(Filter::Rt, "rt", &clean).unwrap())
            .remove(0);
        let options: Vec<_> = case.inputs.iter().map(|i| i.option.as_str()).collect();
        assert_eq!(options, ["hdr", "alb", "nrm"]);
        assert_eq!(
            case.inputs[1].path,
            Path::new("/baseline/rt/img.input.alb.pfm")
        );
        assert!(case.clean_aux);
        assert_eq!(
            case.reference,
            Path::new("/baseline/rt/img.rt_hdr_calb_cnrm.hdr.pfm")
        );
    }

    #[test]
    fn test_directional_lightmap_uses_sh1x() {
        let dir_set = set(&["dir"], false);
        let fs = populated(Filter::RtLightmap, "lm", &dir_set, &["room"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        assert_eq!(generator.discover_images("lm", &dir_set).unwrap(), ["room"]);
        let case = collect(generator.expand(Filter::RtLightmap, "lm", &dir_set).unwrap())
            .remove(0);
        assert_eq!(case.inputs[0].option, "dir");
        assert_eq!(
            case.reference,
            Path::new("/baseline/lm/room.rtlightmap_dir.sh1x.pfm")
        );
    }

    #[test]
    fn test_case_command_flags() {
        let case = TestCase {
            filter: Filter::Rt,
            quality: Quality::Balanced,
            features_str: "hdr_calb".to_string(),
            image: "img".to_string(),
            precision: Precision::Fp16,
            in_place: true,
            max_memory: Some(200),
            inputs: vec![
                FeatureInput {
                    option: "hdr".to_string(),
                    path: PathBuf::from("/b/img.input.hdr.pfm"),
                },
                FeatureInput {
                    option: "alb".to_string(),
                    path: PathBuf::from("/b/img.input.alb.pfm"),
                },
            ],
            reference: PathBuf::from("/b/img.rt_hdr_calb.hdr.pfm"),
            clean_aux: true,
        };

        assert_eq!(case.name(), "RT.balanced.hdr_calb.img.fp16.inplace.maxmem200");
        let cmd = case.command(Path::new("/bin"), Some("cpu"));
        let args: Vec<String> = cmd
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--device",
                "cpu",
                "-f",
                "RT",
                "-q",
                "balanced",
                "--hdr",
                "/b/img.input.hdr.pfm",
                "--alb",
                "/b/img.input.alb.pfm",
                "--ref",
                "/b/img.rt_hdr_calb.hdr.pfm",
                "-n",
                "3",
                "-v",
                "2",
                "--clean_aux",
                "-t",
                "half",
                "--inplace",
                "--maxmem",
                "200",
            ]
        );
    }

    #[test]
    fn test_result_name_round_trips_with_baseline_naming() {
        let hdr_alb = set(&["hdr", "alb"], false);
        let fs = populated(Filter::Rt, "rt", &hdr_alb, &["img"]);
        let cfg = config(false);
        let generator = MatrixGenerator::new(&fs, &cfg);

        let case = collect(generator.expand(Filter::Rt, "rt", &hdr_alb).unwrap()).remove(0);
        assert_eq!(
            case.reference.file_name().unwrap().to_string_lossy(),
            "img.rt_hdr_alb.hdr.pfm"
        );
    }
}
