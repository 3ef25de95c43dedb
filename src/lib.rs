pub mod boundary;
pub mod cancel;
pub mod config;
pub mod contour;
pub mod decode;
pub mod document;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod quantize;
pub mod refine;
pub mod region;
pub mod simplify;

pub use cancel::CancelToken;
pub use config::{DerivedParams, ModeProfile, VectorizeMode, VectorizeOptions, default_options};
pub use decode::PixelBuffer;
pub use document::{ColorGroup, Shape, VectorDocument};
pub use error::{ErrorKind, VectorizeError, VectorizeResult};
pub use quantize::{Palette, PaletteColor};

use std::path::Path;

use rayon::prelude::*;

use crate::boundary::{TracedRegion, fit_shapes};
use crate::contour::trace_region;
use crate::decode::{decode, downsample};
use crate::quantize::quantize;
use crate::refine::Refiner;
use crate::region::extract_regions;

/// Entry point for configuring and running the raster-to-vector pipeline.
///
/// A `Vectorizer` holds no state between runs; one instance may serve many
/// concurrent invocations.
#[derive(Debug, Clone, Default)]
pub struct Vectorizer {
    options: VectorizeOptions,
    /// `None` runs on the global rayon pool.
    threads: Option<usize>,
    cancel: CancelToken,
}

impl Vectorizer {
    pub fn new(options: VectorizeOptions) -> Self {
        Self {
            options,
            threads: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set the number of worker threads. `None` uses the global pool.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &VectorizeOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Decode encoded image bytes and vectorize them.
    pub fn vectorize(&self, bytes: &[u8]) -> VectorizeResult<VectorDocument> {
        self.validate()?;
        self.cancel.check()?;
        let buffer = decode(bytes)?;
        tracing::debug!(
            width = buffer.width(),
            height = buffer.height(),
            "decoded image"
        );
        self.run(buffer)
    }

    /// Vectorize an already decoded pixel buffer.
    pub fn vectorize_pixels(&self, buffer: &PixelBuffer) -> VectorizeResult<VectorDocument> {
        self.validate()?;
        self.run(buffer.clone())
    }

    /// Read and vectorize an image file.
    pub fn vectorize_file(&self, path: impl AsRef<Path>) -> VectorizeResult<VectorDocument> {
        self.validate()?;
        let bytes = std::fs::read(path.as_ref())?;
        self.vectorize(&bytes)
    }

    fn validate(&self) -> VectorizeResult<()> {
        self.options.validate()?;
        if self.threads == Some(0) {
            return Err(VectorizeError::options("threads", "must be at least 1"));
        }
        Ok(())
    }

    fn run(&self, buffer: PixelBuffer) -> VectorizeResult<VectorDocument> {
        match self.threads {
            None => self.pipeline(buffer),
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| VectorizeError::Internal(format!("thread pool: {e}")))?;
                pool.install(|| self.pipeline(buffer))
            }
        }
    }

    fn pipeline(&self, buffer: PixelBuffer) -> VectorizeResult<VectorDocument> {
        let params = self.options.derived();
        let buffer = downsample(buffer, self.options.max_pixels);
        let (width, height) = buffer.dimensions();
        self.cancel.check()?;

        let (palette, labels) = quantize(&buffer, self.options.colors as usize);
        tracing::debug!(palette = palette.len(), "quantized colors");
        self.cancel.check()?;

        let map = extract_regions(&labels, params.min_region_area);
        self.cancel.check()?;

        let refiner = Refiner::for_image(&map, &buffer, params.refine);
        tracing::debug!(
            regions = map.regions().len(),
            dropped = map.dropped(),
            min_area = params.min_region_area,
            refine = refiner.is_some(),
            tolerance = params.tolerance,
            "tracing regions"
        );

        let traced = map
            .regions()
            .par_iter()
            .map(|region| {
                self.cancel.check()?;
                let contours = trace_region(&map, region)?;
                Ok(match &refiner {
                    Some(refiner) => TracedRegion::new(&map, &contours, &refiner.refine(&contours)),
                    None => TracedRegion::new(&map, &contours, &contours),
                })
            })
            .collect::<VectorizeResult<Vec<_>>>()?;
        self.cancel.check()?;

        let shapes = fit_shapes(&traced, params.tolerance, params.smoothness, &self.cancel)?;
        self.cancel.check()?;

        let document = VectorDocument::new(
            width,
            height,
            self.options.path_precision,
            palette,
            shapes,
        );
        tracing::info!(
            width,
            height,
            mode = %self.options.mode,
            colors = document.groups().len(),
            regions = document.region_count(),
            "vectorization complete"
        );
        Ok(document)
    }
}

/// Decode `bytes` and vectorize them with `options`.
pub fn vectorize(bytes: &[u8], options: &VectorizeOptions) -> VectorizeResult<VectorDocument> {
    Vectorizer::new(options.clone()).vectorize(bytes)
}

/// Vectorize a raw RGBA pixel buffer with `options`.
pub fn vectorize_pixels(
    buffer: &PixelBuffer,
    options: &VectorizeOptions,
) -> VectorizeResult<VectorDocument> {
    Vectorizer::new(options.clone()).vectorize_pixels(buffer)
}

/// Read the image at `path` and vectorize it with `options`.
pub fn vectorize_file(
    path: impl AsRef<Path>,
    options: &VectorizeOptions,
) -> VectorizeResult<VectorDocument> {
    Vectorizer::new(options.clone()).vectorize_file(path)
}

/// Convert encoded PNG bytes to SVG text.
pub fn png_to_svg(bytes: &[u8], options: &VectorizeOptions) -> VectorizeResult<String> {
    vectorize(bytes, options).map(|document| document.to_string())
}
