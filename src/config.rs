//! Configuration types for table extraction.
//!
//! Everything the orchestrator needs to know lives in [`ExtractionConfig`],
//! built through [`ExtractionConfigBuilder`]. The rendering resolution is held
//! exactly once, as a [`Dpi`], and handed to both the token extractor and the
//! rasteriser so the two can never drift apart.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use crate::recognize::RecognitionOutputs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// PDF user space unit: 72 points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Rendering resolution shared by token scaling and page rasterisation.
///
/// A point-space coordinate `v` maps to pixel `floor(v * dpi / 72)`. Both the
/// token boxes and the rendered bitmap dimensions go through
/// [`Dpi::to_pixels`], so a token at the right edge of the page lands on the
/// last pixel column of the image and never beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dpi(u32);

impl Dpi {
    pub const MIN: u32 = 72;
    pub const MAX: u32 = 400;

    /// Construct a `Dpi`, rejecting values outside `MIN..=MAX`.
    pub fn new(dpi: u32) -> Result<Self, ExtractError> {
        if !(Self::MIN..=Self::MAX).contains(&dpi) {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be {}–{}, got {}",
                Self::MIN,
                Self::MAX,
                dpi
            )));
        }
        Ok(Self(dpi))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Points → pixels scale factor (`dpi / 72`).
    pub fn scale(self) -> f64 {
        f64::from(self.0) / POINTS_PER_INCH
    }

    /// Convert a point-space coordinate into an integer pixel coordinate.
    pub fn to_pixels(self, points: f32) -> i32 {
        // Multiply before dividing: keeps whole-point page sizes exact.
        (f64::from(points) * f64::from(self.0) / POINTS_PER_INCH).floor() as i32
    }
}

impl Default for Dpi {
    fn default() -> Self {
        Self(100)
    }
}

impl fmt::Display for Dpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dpi", self.0)
    }
}

/// What happens to the rest of the document when one page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort on the first failing page and discard everything aggregated so
    /// far. The whole request yields a single error. (default)
    #[default]
    FailClosed,
    /// Record the failing page, keep going, and return the HTML of every page
    /// that succeeded together with the list of failures.
    BestEffort,
}

/// Configuration for a table extraction run.
///
/// # Example
/// ```rust
/// use pdf_tables::{ExtractionConfig, FailurePolicy};
///
/// let config = ExtractionConfig::builder()
///     .dpi(150)
///     .failure_policy(FailurePolicy::BestEffort)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi.get(), 150);
/// ```
#[derive(Clone, Default)]
pub struct ExtractionConfig {
    /// Resolution for both token coordinates and page images. Default: 100.
    pub dpi: Dpi,

    /// Fail-closed (default) or best-effort page handling.
    pub failure_policy: FailurePolicy,

    /// Which structures the recognizer is asked to return. Default: all.
    pub outputs: RecognitionOutputs,

    /// Directory or full path of the pdfium shared library.
    /// `None` binds to the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("failure_policy", &self.failure_policy)
            .field("outputs", &self.outputs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            dpi: Dpi::default().get(),
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    dpi: u32,
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn outputs(mut self, outputs: RecognitionOutputs) -> Self {
        self.config.outputs = outputs;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Register a callback that receives per-page progress events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let mut config = self.config;
        config.dpi = Dpi::new(self.dpi)?;
        if !config.outputs.html {
            return Err(ExtractError::InvalidConfig(
                "HTML output must be requested: it is the aggregated result".into(),
            ));
        }
        Ok(config)
    }
}
