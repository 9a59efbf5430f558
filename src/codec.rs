// ============================================================================
// IMAGE CODEC — encoded payloads and format conversion
// ============================================================================
//
// Every image that crosses a boundary (file import, API request, API
// response, download) travels as an `EncodedImage`: container bytes plus the
// MIME type they decode as. Conversion between containers happens in exactly
// one place, `reencode`, so the "white background under JPEG" rule is never
// duplicated.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::BufWriter;

/// Fixed quality for lossy re-encodes (matches the studio's download path).
pub const JPEG_QUALITY: u8 = 90;

/// User-selectable output encoding for downloads and text-to-image requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Png => "PNG",
            OutputFormat::Jpeg => "JPEG",
        }
    }
}

/// A self-contained encoded image: container bytes + the MIME type they
/// carry. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Debug)]
pub enum CodecError {
    /// The bytes are not a decodable image container.
    Decode(String),
    /// Re-encoding to the target container failed.
    Encode(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Decode(e) => write!(f, "Failed to decode image: {}", e),
            CodecError::Encode(e) => write!(f, "Image conversion failed: {}", e),
        }
    }
}

fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Gif => "image/gif",
        _ => "application/octet-stream",
    }
}

impl EncodedImage {
    /// Wrap raw container bytes, sniffing the MIME type from the magic
    /// numbers. Rejects data whose container cannot be identified.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        let format = image::guess_format(&bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Self {
            bytes,
            mime: mime_for_format(format).to_string(),
        })
    }

    /// Wrap bytes whose MIME type is already known (e.g. declared by the
    /// generation service). No sniffing, no validation.
    pub fn with_mime(bytes: Vec<u8>, mime: String) -> Self {
        Self { bytes, mime }
    }

    /// Encode a raw raster as an opaque PNG payload (the draw-to-image wire
    /// format).
    pub fn from_raster_png(raster: &RgbaImage) -> Result<Self, CodecError> {
        Ok(Self {
            bytes: encode_png(raster)?,
            mime: "image/png".to_string(),
        })
    }

    /// Decode to a raster at native pixel dimensions.
    pub fn decode(&self) -> Result<RgbaImage, CodecError> {
        image::load_from_memory(&self.bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    {
        let mut writer = BufWriter::new(&mut out);
        let encoder = PngEncoder::new(&mut writer);
        #[allow(deprecated)]
        encoder
            .encode(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| CodecError::Encode(e.to_string()))?;
    }
    Ok(out)
}

fn encode_jpeg(raster: &RgbaImage) -> Result<Vec<u8>, CodecError> {
    // JPEG has no alpha channel: composite over opaque white before the
    // RGBA → RGB collapse so transparency doesn't turn black.
    let mut flattened = RgbaImage::from_pixel(
        raster.width(),
        raster.height(),
        Rgba([255, 255, 255, 255]),
    );
    image::imageops::overlay(&mut flattened, raster, 0, 0);
    let rgb = DynamicImage::ImageRgba8(flattened).to_rgb8();

    let mut out = Vec::new();
    {
        let mut writer = BufWriter::new(&mut out);
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| CodecError::Encode(e.to_string()))?;
    }
    Ok(out)
}

/// Convert a payload to the target container.
///
/// A payload already in the target container is returned unchanged
/// (byte-identical — no decode round-trip). Everything else is decoded at
/// native dimensions and re-encoded.
pub fn reencode(image: &EncodedImage, target: OutputFormat) -> Result<EncodedImage, CodecError> {
    if image.mime == target.mime() {
        return Ok(image.clone());
    }

    let raster = image.decode()?;
    let bytes = match target {
        OutputFormat::Png => encode_png(&raster)?,
        OutputFormat::Jpeg => encode_jpeg(&raster)?,
    };
    Ok(EncodedImage::with_mime(bytes, target.mime().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([10, 200, 30, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn sniffs_png_mime_from_magic_numbers() {
        let png = EncodedImage::from_raster_png(&checker(4, 4)).unwrap();
        let sniffed = EncodedImage::from_bytes(png.bytes.clone()).unwrap();
        assert_eq!(sniffed.mime, "image/png");
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(EncodedImage::from_bytes(b"not an image at all".to_vec()).is_err());
    }

    #[test]
    fn same_format_reencode_is_byte_identical() {
        let png = EncodedImage::from_raster_png(&checker(8, 8)).unwrap();
        let out = reencode(&png, OutputFormat::Png).unwrap();
        assert_eq!(out.bytes, png.bytes);
        assert_eq!(out.mime, png.mime);
    }

    #[test]
    fn png_to_jpeg_and_back_preserves_dimensions() {
        let png = EncodedImage::from_raster_png(&checker(13, 7)).unwrap();
        let jpeg = reencode(&png, OutputFormat::Jpeg).unwrap();
        assert_eq!(jpeg.mime, "image/jpeg");
        let back = reencode(&jpeg, OutputFormat::Png).unwrap();
        let raster = back.decode().unwrap();
        assert_eq!((raster.width(), raster.height()), (13, 7));
    }

    #[test]
    fn jpeg_reencode_flattens_transparency_to_white() {
        // A fully transparent source must come back white, not black.
        let clear = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 0]));
        let png = EncodedImage::from_raster_png(&clear).unwrap();
        let jpeg = reencode(&png, OutputFormat::Jpeg).unwrap();
        let raster = jpeg.decode().unwrap();
        let px = raster.get_pixel(1, 1);
        assert!(px[0] > 240 && px[1] > 240 && px[2] > 240, "got {:?}", px);
    }
}
