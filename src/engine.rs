//! Binding to the pdfium shared library.
//!
//! `Pdfium` is not `Send`, so it is bound on the blocking worker that owns
//! the document rather than shared between requests. [`PdfEngine`] only
//! carries the library location and is cheap to clone into each worker.

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where to load libpdfium from.
#[derive(Debug, Clone, Default)]
pub struct PdfEngine {
    library_path: Option<PathBuf>,
}

impl PdfEngine {
    /// `library_path` may name the library file itself or the directory
    /// containing it. `None` uses the system library search path.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library_path.as_deref()
    }

    /// Bind to the library. Blocking.
    pub fn bind(&self) -> Result<Pdfium, ExtractError> {
        let bindings = match self.library_path {
            Some(ref path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(ref path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractError::EngineUnavailable(format!("{e:?}")))?;

        debug!(
            "Bound pdfium from {}",
            self.library_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "system library path".to_string())
        );
        Ok(Pdfium::new(bindings))
    }

    /// Bind once on a blocking thread to verify the library is loadable.
    pub async fn check(&self) -> Result<(), ExtractError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.bind().map(drop))
            .await
            .map_err(|e| ExtractError::Internal(format!("pdfium check panicked: {e}")))?
    }
}
