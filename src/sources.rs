// ============================================================================
// SOURCE IMAGES — acquisition and normalization of user-supplied images
// ============================================================================
//
// Files arrive from the native picker, drag-and-drop, or the clipboard. Each
// accepted file becomes a `SourceImage`: a decoded raster for preview plus an
// encoded payload for the API call, independent of the originating file
// handle. A batch either decodes completely or is rejected as a whole.

use eframe::egui;
use image::RgbaImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::codec::{CodecError, EncodedImage};

#[derive(Debug, PartialEq, Eq)]
pub enum SourceError {
    /// At least one file in the batch could not be read or decoded.
    ReadFailed,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::ReadFailed => write!(f, "Failed to read one or more files."),
        }
    }
}

/// One collected source image.
pub struct SourceImage {
    /// Encoded payload sent on the wire (MIME sniffed from the bytes).
    pub payload: EncodedImage,
    /// Decoded raster, kept for thumbnail display.
    pub raster: RgbaImage,
    /// Preview texture cache, filled lazily by the UI.
    pub texture: Option<egui::TextureHandle>,
}

impl SourceImage {
    pub fn from_encoded_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        let payload = EncodedImage::from_bytes(bytes)?;
        let raster = payload.decode()?;
        Ok(Self {
            payload,
            raster,
            texture: None,
        })
    }

    /// Wrap an already-decoded raster (clipboard paste), encoding it as PNG.
    pub fn from_raster(raster: RgbaImage) -> Result<Self, CodecError> {
        let payload = EncodedImage::from_raster_png(&raster)?;
        Ok(Self {
            payload,
            raster,
            texture: None,
        })
    }
}

/// Extension-derived MIME type — the "declared type" of a local file.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .and_then(|e| mime_for_extension(&e))
        .is_some()
}

/// Keep only entries whose declared type indicates an image, preserving the
/// original order. Non-image entries are dropped silently.
pub fn filter_image_files(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.into_iter().filter(|p| is_image_file(p)).collect()
}

/// Decode a batch of image files concurrently.
///
/// All-or-nothing: any read or decode failure rejects the entire batch so a
/// partial set is never appended. Order of the input paths is preserved.
pub fn decode_batch(paths: &[PathBuf]) -> Result<Vec<SourceImage>, SourceError> {
    paths
        .par_iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|_| SourceError::ReadFailed)?;
            SourceImage::from_encoded_bytes(bytes).map_err(|_| SourceError::ReadFailed)
        })
        .collect()
}

/// Pull an image off the system clipboard as a new source image.
pub fn from_clipboard() -> Result<SourceImage, String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
    let data = clipboard
        .get_image()
        .map_err(|_| "No image on the clipboard.".to_string())?;
    let raster = RgbaImage::from_raw(
        data.width as u32,
        data.height as u32,
        data.bytes.into_owned(),
    )
    .ok_or_else(|| "Clipboard image has an unexpected layout.".to_string())?;
    SourceImage::from_raster(raster).map_err(|e| e.to_string())
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Ordered, mutable collection of source images for the active session.
#[derive(Default)]
pub struct SourceCollector {
    images: Vec<SourceImage>,
}

impl SourceCollector {
    pub fn append_batch(&mut self, batch: Vec<SourceImage>) {
        self.images.extend(batch);
    }

    pub fn push(&mut self, image: SourceImage) {
        self.images.push(image);
    }

    /// Remove one entry, shifting subsequent entries down. Out-of-range is a
    /// no-op.
    pub fn remove(&mut self, index: usize) {
        if index < self.images.len() {
            self.images.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceImage> {
        self.images.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SourceImage> {
        self.images.iter_mut()
    }

    /// Encoded payloads in collection order, for request construction.
    pub fn payloads(&self) -> Vec<EncodedImage> {
        self.images.iter().map(|s| s.payload.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("imagestudio-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_pixel(w, h, Rgba([40, 90, 200, 255]));
        img.save(&path).expect("write test png");
        path
    }

    #[test]
    fn filter_drops_non_image_entries_and_keeps_order() {
        let paths = vec![
            PathBuf::from("first.png"),
            PathBuf::from("notes.txt"),
            PathBuf::from("second.JPG"),
        ];
        let filtered = filter_image_files(paths);
        assert_eq!(
            filtered,
            vec![PathBuf::from("first.png"), PathBuf::from("second.JPG")]
        );
    }

    #[test]
    fn decode_batch_preserves_input_order() {
        let dir = temp_dir("order");
        let a = write_png(&dir, "a.png", 3, 3);
        let b = write_png(&dir, "b.png", 5, 5);
        let batch = decode_batch(&[a, b]).expect("batch decodes");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].raster.width(), 3);
        assert_eq!(batch[1].raster.width(), 5);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_rejects_the_whole_batch() {
        let dir = temp_dir("corrupt");
        let good = write_png(&dir, "good.png", 4, 4);
        let bad = dir.join("bad.png");
        std::fs::write(&bad, b"definitely not a png").expect("write corrupt file");

        let result = decode_batch(&[good, bad]);
        assert_eq!(result.err(), Some(SourceError::ReadFailed));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn remove_out_of_range_is_a_noop() {
        let dir = temp_dir("remove");
        let a = write_png(&dir, "a.png", 2, 2);
        let mut collector = SourceCollector::default();
        collector.append_batch(decode_batch(&[a]).expect("decodes"));

        collector.remove(5);
        assert_eq!(collector.len(), 1);
        collector.remove(0);
        assert!(collector.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn payload_mime_comes_from_the_bytes() {
        let dir = temp_dir("mime");
        // Declared extension says jpg, bytes are PNG — the payload reflects
        // what the bytes actually are.
        let path = dir.join("mislabeled.jpg");
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        {
            use image::codecs::png::PngEncoder;
            let encoder = PngEncoder::new(&mut bytes);
            #[allow(deprecated)]
            encoder
                .encode(img.as_raw(), 2, 2, image::ColorType::Rgba8)
                .expect("encode");
        }
        std::fs::write(&path, &bytes).expect("write");

        let batch = decode_batch(&[path]).expect("decodes");
        assert_eq!(batch[0].payload.mime, "image/png");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
