//! Axis types of the regression matrix

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Denoiser filter kinds under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Filter {
    /// Generic ray tracing (beauty/color) filter
    #[serde(rename = "RT")]
    Rt,
    /// Lightmap filter, including directional lightmaps
    #[serde(rename = "RTLightmap")]
    RtLightmap,
}

impl Filter {
    pub const ALL: [Filter; 2] = [Filter::Rt, Filter::RtLightmap];

    /// Spelling passed to the denoiser's `-f` option
    pub fn as_str(self) -> &'static str {
        match self {
            Filter::Rt => "RT",
            Filter::RtLightmap => "RTLightmap",
        }
    }

    /// Lowercase prefix of result names
    pub fn result_prefix(self) -> &'static str {
        match self {
            Filter::Rt => "rt",
            Filter::RtLightmap => "rtlightmap",
        }
    }

    /// The beauty filter is exercised at every quality level.
    pub fn is_beauty(self) -> bool {
        self == Filter::Rt
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == s)
            .ok_or_else(|| format!("unknown filter '{s}' (expected RT or RTLightmap)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    High,
    Balanced,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Fp32,
    Fp16,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Fp32 => "fp32",
            Precision::Fp16 => "fp16",
        }
    }
}

/// CPU architecture the executed binaries are constrained to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arch {
    #[default]
    Native,
    Pnr,
    Hsw,
    Skx,
}

impl Arch {
    pub const ALL: [Arch; 4] = [Arch::Native, Arch::Pnr, Arch::Hsw, Arch::Skx];

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Native => "native",
            Arch::Pnr => "pnr",
            Arch::Hsw => "hsw",
            Arch::Skx => "skx",
        }
    }

    pub fn is_native(self) -> bool {
        self == Arch::Native
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| format!("unknown architecture '{s}' (expected native, pnr, hsw or skx)"))
    }
}

/// Harness command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Populate the baseline tree from raw inputs
    Baseline,
    /// Denoise every matrix case against the stored baseline
    #[default]
    Run,
}
