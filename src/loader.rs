use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader, RgbaImage};

use crate::config::DEF_FRAME_DELAY_MS;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Decoded image data
// ---------------------------------------------------------------------------

/// One RGBA frame. Stills have exactly one with `delay_ms == 0`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub delay_ms: u32,
}

impl Frame {
    fn from_rgba(img: RgbaImage, delay_ms: u32) -> Self {
        let (width, height) = img.dimensions();
        Self {
            rgba_bytes: img.into_raw(),
            width,
            height,
            delay_ms,
        }
    }
}

#[derive(Debug)]
pub struct DecodedImage {
    pub frames: Vec<Frame>,
}

impl DecodedImage {
    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Total loop length in milliseconds.
    pub fn length_ms(&self) -> u32 {
        self.frames.iter().map(|f| f.delay_ms).sum()
    }
}

/// Decode `path` fully. Animated GIF and WebP keep every frame; `frame_delay`
/// (from `-A`) replaces the per-frame delays when set.
pub fn decode_image(path: &Path, frame_delay: Option<u32>) -> Result<DecodedImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| Error::io(path, e))?
        .with_guessed_format()
        .map_err(|e| Error::io(path, e))?;
    let format = reader.format();

    let frames = match format {
        Some(ImageFormat::Gif) => decode_frames(path, frame_delay, |r| {
            GifDecoder::new(r).map(|d| Some(d.into_frames().collect_frames()))
        })?,
        Some(ImageFormat::WebP) => decode_frames(path, frame_delay, |r| {
            let d = WebPDecoder::new(r)?;
            if d.has_animation() {
                Ok(Some(d.into_frames().collect_frames()))
            } else {
                Ok(None)
            }
        })?,
        _ => None,
    };

    let frames = match frames {
        Some(frames) => frames,
        None => {
            let img = reader.decode().map_err(|e| Error::decode(path, e))?;
            let img = apply_orientation(img, exif_orientation(path));
            vec![Frame::from_rgba(img.to_rgba8(), 0)]
        }
    };

    log::debug!(
        "decoded {:?} ({:?}): {} frame(s), {}x{}",
        path,
        format,
        frames.len(),
        frames[0].width,
        frames[0].height
    );
    Ok(DecodedImage { frames })
}

type FrameResult = image::ImageResult<Vec<image::Frame>>;

/// Run an animation decoder. `Ok(None)` means "not animated, decode as still".
fn decode_frames<F>(path: &Path, frame_delay: Option<u32>, open: F) -> Result<Option<Vec<Frame>>>
where
    F: FnOnce(BufReader<File>) -> image::ImageResult<Option<FrameResult>>,
{
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let Some(collected) = open(BufReader::new(file)).map_err(|e| Error::decode(path, e))? else {
        return Ok(None);
    };
    let raw = collected.map_err(|e| Error::decode(path, e))?;
    if raw.len() <= 1 {
        return Ok(None);
    }
    let frames = raw
        .into_iter()
        .map(|f| {
            let (numer, denom) = f.delay().numer_denom_ms();
            let declared = if denom == 0 { 0 } else { numer / denom };
            let delay = match frame_delay {
                Some(d) => d,
                None if declared == 0 => DEF_FRAME_DELAY_MS,
                None => declared,
            };
            Frame::from_rgba(f.into_buffer(), delay)
        })
        .collect();
    Ok(Some(frames))
}

// ---------------------------------------------------------------------------
// EXIF orientation
// ---------------------------------------------------------------------------

/// Read the EXIF Orientation tag (1..=8), if the file carries one.
pub fn exif_orientation(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).filter(|v| (1..=8).contains(v))
}

pub fn apply_orientation(img: DynamicImage, orientation: Option<u32>) -> DynamicImage {
    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}

// ---------------------------------------------------------------------------
// Thumbnail scaling
// ---------------------------------------------------------------------------

/// Decode the first frame of `path`, upright, for thumbnail use.
pub fn decode_still(path: &Path) -> Result<RgbaImage> {
    let img = ImageReader::open(path)
        .map_err(|e| Error::io(path, e))?
        .with_guessed_format()
        .map_err(|e| Error::io(path, e))?
        .decode()
        .map_err(|e| Error::decode(path, e))?;
    Ok(apply_orientation(img, exif_orientation(path)).to_rgba8())
}

/// Scale so that the longer edge is at most `max`. Never upscales.
pub fn shrink_to(img: &RgbaImage, max: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let (tw, th) = fit_within(w, h, max);
    if (tw, th) == (w, h) {
        return img.clone();
    }
    image::imageops::resize(img, tw, th, FilterType::Triangle)
}

/// Dimensions of `w`x`h` scaled into a `max`x`max` box, at least 1x1.
pub fn fit_within(w: u32, h: u32, max: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (1, 1);
    }
    let z = (max as f32 / w as f32).min(max as f32 / h as f32).min(1.0);
    (
        ((w as f32 * z) as u32).max(1),
        ((h as f32 * z) as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Delay, GenericImageView, Rgba};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let p = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
            .save(&p)
            .unwrap();
        p
    }

    #[test]
    fn decodes_still_png() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_png(dir.path(), "a.png", 7, 3);
        let img = decode_image(&p, None).unwrap();
        assert_eq!(img.frames.len(), 1);
        assert!(!img.is_animated());
        assert_eq!((img.frames[0].width, img.frames[0].height), (7, 3));
        assert_eq!(img.frames[0].rgba_bytes.len(), 7 * 3 * 4);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bad.png");
        std::fs::write(&p, b"definitely not a png").unwrap();
        assert!(decode_image(&p, None).is_err());
        assert!(decode_still(&p).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        match decode_image(Path::new("/nonexistent/x.png"), None) {
            Err(Error::Io { .. }) => {}
            other => panic!("expected Io error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn gif_frames_keep_delays() {
        use image::codecs::gif::{GifEncoder, Repeat};

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("anim.gif");
        {
            let file = File::create(&p).unwrap();
            let mut enc = GifEncoder::new(file);
            enc.set_repeat(Repeat::Infinite).unwrap();
            let a = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
            let b = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
            enc.encode_frame(image::Frame::from_parts(a, 0, 0, Delay::from_numer_denom_ms(200, 1)))
                .unwrap();
            enc.encode_frame(image::Frame::from_parts(b, 0, 0, Delay::from_numer_denom_ms(0, 1)))
                .unwrap();
        }

        let img = decode_image(&p, None).unwrap();
        assert!(img.is_animated());
        assert_eq!(img.frames[0].delay_ms, 200);
        assert_eq!(img.frames[1].delay_ms, DEF_FRAME_DELAY_MS);
        assert_eq!(img.length_ms(), 200 + DEF_FRAME_DELAY_MS);

        let forced = decode_image(&p, Some(40)).unwrap();
        assert!(forced.frames.iter().all(|f| f.delay_ms == 40));
    }

    #[test]
    fn orientation_transforms_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(4, 2));
        assert_eq!(apply_orientation(img.clone(), Some(6)).dimensions(), (2, 4));
        assert_eq!(apply_orientation(img.clone(), Some(3)).dimensions(), (4, 2));
        assert_eq!(apply_orientation(img.clone(), Some(8)).dimensions(), (2, 4));
        assert_eq!(apply_orientation(img, None).dimensions(), (4, 2));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(10, 5, 160), (10, 5));
        assert_eq!(fit_within(320, 160, 160), (160, 80));
        assert_eq!(fit_within(1000, 1, 100), (100, 1));
        assert_eq!(fit_within(0, 5, 100), (1, 1));
    }

    #[test]
    fn shrink_to_limits_longer_edge() {
        let img = RgbaImage::new(400, 100);
        let small = shrink_to(&img, 160);
        assert_eq!(small.dimensions(), (160, 40));
    }
}
