use futures::future::BoxFuture;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::models::image::{ImageMetadata, Orientation};
use crate::services::handlers::{HandlerError, JobHandler};
use crate::services::media::{MediaError, MediaLibrary};

const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// Extracts image metadata and renders a width-bounded thumbnail.
#[derive(Debug, Clone)]
pub struct ThumbnailProcessor {
    media: MediaLibrary,
    max_width: u32,
}

impl ThumbnailProcessor {
    pub fn new(media: MediaLibrary, max_width: u32) -> Self {
        Self {
            media,
            max_width: max_width.max(1),
        }
    }

    /// Process one stored original: write its thumbnail and metadata sidecar.
    pub async fn process(&self, resource_id: &str) -> Result<ImageMetadata, ImageProcessingError> {
        let bytes = self.media.read_original(resource_id).await?;
        let thumbnail_path = self.media.thumbnail_path(resource_id)?;
        let max_width = self.max_width;

        let metadata = tokio::task::spawn_blocking(move || {
            render_thumbnail(&bytes, &thumbnail_path, max_width)
        })
        .await??;

        let sidecar = self.media.metadata_path(resource_id)?;
        self.media.write_json(&sidecar, &metadata).await?;

        tracing::debug!(
            resource_id,
            width = metadata.width,
            height = metadata.height,
            orientation = %metadata.orientation,
            "Thumbnail and metadata written"
        );
        Ok(metadata)
    }
}

impl JobHandler for ThumbnailProcessor {
    fn handle(&self, resource_id: String) -> BoxFuture<'static, Result<(), HandlerError>> {
        let processor = self.clone();
        Box::pin(async move {
            processor
                .process(&resource_id)
                .await
                .map(|_| ())
                .map_err(|e| HandlerError::from_error(&e))
        })
    }
}

/// Decode `bytes`, write a thumbnail to `out`, and describe the original.
///
/// Images narrower than `max_width` are copied at their own size. PNG and
/// WebP keep their format; everything else becomes JPEG.
pub fn render_thumbnail(
    bytes: &[u8],
    out: &Path,
    max_width: u32,
) -> Result<ImageMetadata, ImageProcessingError> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(ImageProcessingError::EmptyImage);
    }

    let thumbnail = if width > max_width {
        let scaled_height = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1);
        img.resize_exact(max_width, scaled_height as u32, FilterType::Lanczos3)
    } else {
        img
    };

    let writer = BufWriter::new(File::create(out)?);
    match format {
        ImageFormat::Png => thumbnail.write_with_encoder(PngEncoder::new(writer))?,
        ImageFormat::WebP => DynamicImage::ImageRgba8(thumbnail.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(writer))?,
        _ => DynamicImage::ImageRgb8(thumbnail.to_rgb8()).write_with_encoder(
            JpegEncoder::new_with_quality(writer, THUMBNAIL_JPEG_QUALITY),
        )?,
    }

    Ok(ImageMetadata {
        width,
        height,
        aspect_ratio: f64::from(width) / f64::from(height),
        orientation: Orientation::from_dimensions(width, height),
        file_size: bytes.len() as u64,
        mime_type: format.to_mime_type().to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ImageProcessingError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image has zero width or height")]
    EmptyImage,

    #[error("Thumbnail write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Thumbnail task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}
