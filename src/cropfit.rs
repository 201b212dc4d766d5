use std::io::Cursor;

use crate::error::{FolioError, FolioResult};

/// Fractional sub-rectangle of a source asset's natural dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropWindow {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropWindow {
    pub const FULL: CropWindow = CropWindow {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Sampling rectangle in source pixels: the region of the source that is
/// resampled into the target box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Compute the source sampling rectangle for a crop window and target box.
///
/// With `allow_scale` (vector sources that rescale anisotropically without
/// quality loss) the sampling size is the crop window exactly; the
/// stretch-to-fit happens at the renderer's scale step. Otherwise the
/// sampling rectangle takes the target box's aspect ratio, bound by the
/// crop window's width or height.
///
/// The width/height-bound rule can produce a rectangle extending past the
/// crop window when the target aspect ratio is extreme. That is the
/// behavior this engine has always had and callers rely on the figures as
/// computed; raster resampling clamps to the source bounds separately
/// (see [`render_crop`]).
pub fn compute_sampling(
    natural_width: f64,
    natural_height: f64,
    crop: CropWindow,
    target_width: f64,
    target_height: f64,
    allow_scale: bool,
) -> FolioResult<SamplingRect> {
    if !(natural_width > 0.0) || !(natural_height > 0.0) {
        return Err(FolioError::degenerate(format!(
            "source has no area ({natural_width}x{natural_height})"
        )));
    }
    if !(target_width > 0.0) || !(target_height > 0.0) {
        return Err(FolioError::degenerate(format!(
            "target box has no area ({target_width}x{target_height})"
        )));
    }

    let available_width = natural_width * crop.width;
    let available_height = natural_height * crop.height;
    if !(available_width > 0.0) || !(available_height > 0.0) {
        return Err(FolioError::degenerate(format!(
            "crop window has no area ({available_width}x{available_height})"
        )));
    }

    let target_aspect = target_width / target_height;
    let available_aspect = available_width / available_height;

    let (width, height) = if allow_scale {
        (available_width, available_height)
    } else if target_aspect >= available_aspect {
        // Width-bound: span the full crop width, derive height.
        (available_width, available_width / target_aspect)
    } else {
        // Height-bound: span the full crop height, derive width.
        (available_height * target_aspect, available_height)
    };

    Ok(SamplingRect {
        x: crop.x * natural_width,
        y: crop.y * natural_height,
        width,
        height,
    })
}

/// Decode a raster source, crop-fit it against the target box and resample
/// into a `target × oversample` buffer. Returns PNG bytes sized
/// `(target_width * oversample, target_height * oversample)`.
pub fn render_crop(
    bytes: &[u8],
    crop: CropWindow,
    target_width: f64,
    target_height: f64,
    oversample: u32,
) -> FolioResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| FolioError::fetch_failed("<image bytes>", format!("decode failed: {e}")))?;
    let (natural_w, natural_h) = (decoded.width(), decoded.height());

    let sampling = compute_sampling(
        f64::from(natural_w),
        f64::from(natural_h),
        crop,
        target_width,
        target_height,
        false,
    )?;

    // The sampling rectangle may extend past the source for extreme target
    // aspect ratios; pixel sampling stays within bounds.
    let x0 = sampling.x.clamp(0.0, f64::from(natural_w)) as u32;
    let y0 = sampling.y.clamp(0.0, f64::from(natural_h)) as u32;
    let w = (sampling.width.round() as u32).clamp(1, natural_w.saturating_sub(x0).max(1));
    let h = (sampling.height.round() as u32).clamp(1, natural_h.saturating_sub(y0).max(1));

    let oversample = oversample.max(1);
    let out_w = ((target_width * f64::from(oversample)).round() as u32).max(1);
    let out_h = ((target_height * f64::from(oversample)).round() as u32).max(1);

    let cropped = decoded.crop_imm(x0, y0, w, h);
    let resized = cropped.resize_exact(out_w, out_h, image::imageops::FilterType::Triangle);

    let mut buf = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| FolioError::Other(anyhow::anyhow!("encode cropped image: {e}")))?;
    Ok(buf)
}
