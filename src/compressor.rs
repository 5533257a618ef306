use std::io::Cursor;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
#[cfg(target_arch = "wasm32")]
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, RgbaImage};

use crate::error::CompressError;
use crate::settings::Settings;

/// Encoding chosen for the compressed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Bmp,
}

impl OutputFormat {
    /// PNG, WEBP and BMP pass through; every other media type is encoded as JPEG.
    pub fn for_media_type(media_type: &str) -> Self {
        match media_type {
            "image/png" => OutputFormat::Png,
            "image/webp" => OutputFormat::WebP,
            "image/bmp" => OutputFormat::Bmp,
            _ => OutputFormat::Jpeg,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Bmp => "image/bmp",
        }
    }

    /// Whether the quality setting has any effect on this encoder. WEBP is lossy
    /// through libwebp; the wasm build only has the lossless pure-Rust encoder.
    pub fn is_lossy(self) -> bool {
        match self {
            OutputFormat::Jpeg => true,
            OutputFormat::WebP => cfg!(not(target_arch = "wasm32")),
            OutputFormat::Png | OutputFormat::Bmp => false,
        }
    }
}

/// Encoded image ready to be handed to a download sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBlob {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl OutputBlob {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Output size for an image of `width` x `height` bounded by `max_dimension`.
///
/// Images already within bounds keep their size. Otherwise the larger side becomes
/// `max_dimension` (width wins a tie) and the other side is scaled by the same ratio,
/// truncated, and kept at least one pixel.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    // Exact floor of side * max / larger, computed in u64.
    let scale = |side: u32, larger: u32| {
        let scaled = u64::from(side) * u64::from(max_dimension) / u64::from(larger);
        (scaled as u32).max(1)
    };
    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Draws `image` onto an RGBA surface of the scaled size and encodes it in the format
/// selected by `source_media_type`.
pub fn compress(
    image: &DynamicImage,
    settings: &Settings,
    source_media_type: &str,
) -> Result<OutputBlob, CompressError> {
    let format = OutputFormat::for_media_type(source_media_type);
    let (src_w, src_h) = image.dimensions();
    let (width, height) = scaled_dimensions(src_w, src_h, settings.max_dimension());

    let surface = draw(image, width, height, settings);

    if (width, height) != (src_w, src_h) {
        log::debug!(
            "resize {}x{} -> {}x{} ({:?})",
            src_w,
            src_h,
            width,
            height,
            settings.filter()
        );
    }

    let quality = format.is_lossy().then(|| settings.quality());
    let bytes = encode(surface, format, quality)?;
    if bytes.is_empty() {
        return Err(CompressError::EmptyOutput);
    }

    log::debug!(
        "re-encode: {} {}x{} (quality {:?}) -> {} bytes",
        format.media_type(),
        width,
        height,
        quality,
        bytes.len()
    );

    Ok(OutputBlob {
        bytes,
        format,
        width,
        height,
    })
}

fn draw(image: &DynamicImage, width: u32, height: u32, settings: &Settings) -> RgbaImage {
    let rgba = image.to_rgba8();
    if rgba.dimensions() == (width, height) {
        return rgba;
    }
    image::imageops::resize(&rgba, width, height, settings.filter().as_filter_type())
}

/// `quality` is `Some` exactly when the format is lossy.
fn encode(
    surface: RgbaImage,
    format: OutputFormat,
    quality: Option<f32>,
) -> Result<Vec<u8>, CompressError> {
    let (w, h) = surface.dimensions();
    let mut buffer = Cursor::new(Vec::new());

    match format {
        OutputFormat::Jpeg => {
            // No alpha in JPEG
            let rgb = DynamicImage::ImageRgba8(surface).into_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));
            encoder.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer).write_image(
                surface.as_raw(),
                w,
                h,
                ExtendedColorType::Rgba8,
            )?;
        }
        #[cfg(not(target_arch = "wasm32"))]
        OutputFormat::WebP => {
            let quality = quality.unwrap_or(1.0) * 100.0;
            let webp = webp::Encoder::from_rgba(surface.as_raw(), w, h).encode(quality);
            return Ok(webp.to_vec());
        }
        #[cfg(target_arch = "wasm32")]
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(&mut buffer).write_image(
                surface.as_raw(),
                w,
                h,
                ExtendedColorType::Rgba8,
            )?;
        }
        OutputFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut buffer);
            encoder.encode(surface.as_raw(), w, h, ExtendedColorType::Rgba8)?;
        }
    }

    Ok(buffer.into_inner())
}

/// Quality on the JPEG encoder's 1-100 scale.
fn jpeg_quality(quality: Option<f32>) -> u8 {
    (quality.unwrap_or(1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        }))
    }

    fn settings(quality: f32, max_dimension: i64) -> Settings {
        Settings::new(quality, max_dimension).unwrap()
    }

    #[test]
    fn format_selection() {
        assert_eq!(OutputFormat::for_media_type("image/png"), OutputFormat::Png);
        assert_eq!(OutputFormat::for_media_type("image/webp"), OutputFormat::WebP);
        assert_eq!(OutputFormat::for_media_type("image/bmp"), OutputFormat::Bmp);
        assert_eq!(OutputFormat::for_media_type("image/jpeg"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::for_media_type("image/gif"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::for_media_type("image/x-icon"), OutputFormat::Jpeg);
        // Exact match only
        assert_eq!(OutputFormat::for_media_type("IMAGE/PNG"), OutputFormat::Jpeg);
    }

    #[test]
    fn scaling_examples() {
        assert_eq!(scaled_dimensions(4000, 2000, 1024), (1024, 512));
        assert_eq!(scaled_dimensions(2000, 4000, 1024), (512, 1024));
        assert_eq!(scaled_dimensions(300, 300, 1024), (300, 300));
        assert_eq!(scaled_dimensions(1024, 1024, 1024), (1024, 1024));
        assert_eq!(scaled_dimensions(2048, 2048, 1024), (1024, 1024));
        assert_eq!(scaled_dimensions(1000, 333, 500), (500, 166));
        assert_eq!(scaled_dimensions(10_000, 1, 100), (100, 1));
    }

    proptest! {
        #[test]
        fn within_bounds_is_untouched(w in 1u32..2000, h in 1u32..2000, extra in 0u32..500) {
            let max = w.max(h) + extra;
            prop_assert_eq!(scaled_dimensions(w, h, max), (w, h));
        }

        #[test]
        fn larger_side_hits_max_and_ratio_holds(w in 1u32..8000, h in 1u32..8000, max in 1u32..4000) {
            prop_assume!(w.max(h) > max);
            let (ow, oh) = scaled_dimensions(w, h, max);
            prop_assert_eq!(ow.max(oh), max);
            prop_assert!(ow <= max && oh <= max && ow >= 1 && oh >= 1);

            // Truncation loses less than one pixel on the scaled side.
            if w >= h {
                let exact = f64::from(h) * f64::from(max) / f64::from(w);
                prop_assert!((exact - f64::from(oh)).abs() < 1.0 || oh == 1);
            } else {
                let exact = f64::from(w) * f64::from(max) / f64::from(h);
                prop_assert!((exact - f64::from(ow)).abs() < 1.0 || ow == 1);
            }
        }
    }

    #[test]
    fn large_png_is_downscaled_and_stays_png() {
        let blob = compress(&gradient(400, 200), &settings(0.8, 100), "image/png").unwrap();
        assert_eq!(blob.format(), OutputFormat::Png);
        assert_eq!(blob.media_type(), "image/png");
        assert_eq!(blob.dimensions(), (100, 50));

        let decoded = image::load_from_memory_with_format(blob.bytes(), ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn gif_source_encodes_as_jpeg_without_scaling() {
        let blob = compress(&gradient(30, 30), &settings(0.8, 1024), "image/gif").unwrap();
        assert_eq!(blob.media_type(), "image/jpeg");
        assert_eq!(image::guess_format(blob.bytes()).unwrap(), ImageFormat::Jpeg);
        assert_eq!(blob.dimensions(), (30, 30));
    }

    #[test]
    fn webp_and_bmp_pass_through() {
        let webp = compress(&gradient(20, 10), &settings(0.5, 64), "image/webp").unwrap();
        assert_eq!(image::guess_format(webp.bytes()).unwrap(), ImageFormat::WebP);

        let bmp = compress(&gradient(20, 10), &settings(0.5, 64), "image/bmp").unwrap();
        assert_eq!(image::guess_format(bmp.bytes()).unwrap(), ImageFormat::Bmp);
        assert_eq!(bmp.media_type(), "image/bmp");
    }

    #[test]
    fn lower_quality_gives_smaller_jpeg() {
        let img = gradient(128, 128);
        let high = compress(&img, &settings(1.0, 1024), "image/jpeg").unwrap();
        let low = compress(&img, &settings(0.1, 1024), "image/jpeg").unwrap();
        assert!(low.len() < high.len());
        assert!(OutputFormat::Jpeg.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
        assert!(!OutputFormat::Bmp.is_lossy());
    }

    #[test]
    fn lower_quality_gives_smaller_webp() {
        let img = gradient(128, 128);
        let high = compress(&img, &settings(1.0, 1024), "image/webp").unwrap();
        let low = compress(&img, &settings(0.1, 1024), "image/webp").unwrap();
        assert!(OutputFormat::WebP.is_lossy());
        assert!(low.len() < high.len());
        assert_eq!(image::guess_format(low.bytes()).unwrap(), ImageFormat::WebP);

        let decoded = image::load_from_memory(low.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (128, 128));
    }

    #[test]
    fn jpeg_quality_scale() {
        assert_eq!(jpeg_quality(Some(0.8)), 80);
        assert_eq!(jpeg_quality(Some(0.0)), 1);
        assert_eq!(jpeg_quality(Some(1.0)), 100);
        assert_eq!(jpeg_quality(Some(0.456)), 46);
    }
}
