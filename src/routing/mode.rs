//! Processing mode preference for candidate ordering

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whether the caller prefers a fast answer or a high-quality one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Favor backends whose expected latency is under the fast threshold
    #[default]
    Speed,

    /// Favor HighQuality-tier backends, the flagship most of all
    Quality,
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "speed" => Ok(ProcessingMode::Speed),
            "quality" => Ok(ProcessingMode::Quality),
            _ => Err(format!("Unknown processing mode: {}", s)),
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingMode::Speed => write!(f, "speed"),
            ProcessingMode::Quality => write!(f, "quality"),
        }
    }
}

/// Caller's estimate of how hard the image is to cut out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageComplexity {
    Simple,
    #[default]
    Medium,
    /// Hair, fur, translucent or busy backgrounds
    Complex,
}

impl FromStr for ImageComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(ImageComplexity::Simple),
            "medium" => Ok(ImageComplexity::Medium),
            "complex" => Ok(ImageComplexity::Complex),
            _ => Err(format!("Unknown image complexity: {}", s)),
        }
    }
}

/// Production engine suited to an image of the given complexity.
///
/// Only a preference: the recommended backend is ranked first when it is
/// registered, and every other backend stays in the candidate list.
pub fn recommended_backend(complexity: ImageComplexity, mode: ProcessingMode) -> &'static str {
    match (mode, complexity) {
        (ProcessingMode::Speed, ImageComplexity::Simple) => "modnet",
        (ProcessingMode::Speed, _) => "rembg_isnet",
        (ProcessingMode::Quality, ImageComplexity::Complex) => "bgmatting_v2",
        (ProcessingMode::Quality, _) => "fast_bgmatting",
    }
}
