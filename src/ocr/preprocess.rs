use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::geometry::min_area_rect;
use imageproc::morphology::{close, open};
use imageproc::point::Point;

const INK: u8 = 0;
const PAPER: u8 = 255;

/// Tunables for the binarizing cleanup pipeline.
#[derive(Debug, Clone)]
pub struct CleanupParams {
    pub unsharp_sigma: f32,
    pub unsharp_amount: f32,
    pub median_radius: u32,
    /// Odd neighbourhood size of the adaptive threshold.
    pub threshold_block: u32,
    pub threshold_offset: i16,
    pub min_dimension: u32,
    pub morph_radius: u8,
    pub deskew_min_degrees: f32,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            unsharp_sigma: 1.0,
            unsharp_amount: 0.5,
            median_radius: 1,
            threshold_block: 31,
            threshold_offset: 10,
            min_dimension: 1000,
            morph_radius: 1,
            deskew_min_degrees: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cleaned {
    pub image: GrayImage,
    pub skew_degrees: f32,
    pub rotated: bool,
    pub upscaled: bool,
}

/// Runs every cleanup step in order; none of them is optional.
pub fn clean_for_ocr(input: &DynamicImage, params: &CleanupParams) -> Cleaned {
    let sharpened = unsharp_mask(&input.to_rgb8(), params.unsharp_sigma, params.unsharp_amount);
    let gray = imageops::grayscale(&sharpened);
    let denoised = median_filter(&gray, params.median_radius, params.median_radius);
    let binary = adaptive_gaussian_threshold(
        &denoised,
        params.threshold_block,
        params.threshold_offset,
    );
    let (scaled, upscaled) = upscale_small(binary, params.min_dimension);
    let despeckled = remove_speckle(&scaled, params.morph_radius);
    let (image, skew_degrees, rotated) = deskew(despeckled, params.deskew_min_degrees);

    Cleaned {
        image,
        skew_degrees,
        rotated,
        upscaled,
    }
}

/// `orig * (1 + amount) - blur * amount`, clipped to the pixel range.
pub fn unsharp_mask(img: &RgbImage, sigma: f32, amount: f32) -> RgbImage {
    let blurred = imageops::blur(img, sigma);
    let mut out = img.clone();
    for (px, blur_px) in out.pixels_mut().zip(blurred.pixels()) {
        for (channel, blur_channel) in px.0.iter_mut().zip(blur_px.0.iter()) {
            let v = *channel as f32 * (1.0 + amount) - *blur_channel as f32 * amount;
            *channel = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Pixels brighter than their Gaussian-weighted neighbourhood mean minus `offset`
/// become paper, everything else ink.
pub fn adaptive_gaussian_threshold(img: &GrayImage, block: u32, offset: i16) -> GrayImage {
    let block = block.max(3) | 1;
    let sigma = 0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(img, sigma);

    let mut out = GrayImage::new(img.width(), img.height());
    for ((px, mean), dst) in img
        .pixels()
        .zip(local_mean.pixels())
        .zip(out.pixels_mut())
    {
        let threshold = mean.0[0] as i16 - offset;
        *dst = Luma([if px.0[0] as i16 > threshold { PAPER } else { INK }]);
    }
    out
}

/// Doubles both dimensions with cubic interpolation when either side is below `min_dimension`.
pub fn upscale_small(img: GrayImage, min_dimension: u32) -> (GrayImage, bool) {
    let (w, h) = img.dimensions();
    if w >= min_dimension && h >= min_dimension {
        return (img, false);
    }
    (
        imageops::resize(&img, w * 2, h * 2, FilterType::CatmullRom),
        true,
    )
}

/// Morphological close then open.
pub fn remove_speckle(img: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return img.clone();
    }
    open(&close(img, Norm::LInf, radius), Norm::LInf, radius)
}

/// Skew of the ink in degrees, in (-45, 45]. Positive means the text leans clockwise.
pub fn estimate_skew(img: &GrayImage) -> f32 {
    let points: Vec<Point<i32>> = img
        .enumerate_pixels()
        .filter(|(_, _, px)| px.0[0] < 128)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();

    let Some(first) = points.first() else {
        return 0.0;
    };
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in &points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    if max_x - min_x < 2 || max_y - min_y < 2 {
        return 0.0;
    }

    let corners = min_area_rect(&points);
    let edge = |a: Point<i32>, b: Point<i32>| ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let (dx1, dy1) = edge(corners[0], corners[1]);
    let (dx2, dy2) = edge(corners[1], corners[2]);
    let (dx, dy) = if dx1.hypot(dy1) >= dx2.hypot(dy2) {
        (dx1, dy1)
    } else {
        (dx2, dy2)
    };

    normalize_skew(dy.atan2(dx).to_degrees())
}

fn normalize_skew(mut angle: f32) -> f32 {
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    angle
}

/// Rotates by the opposite of the detected skew when it exceeds `min_degrees`.
pub fn deskew(img: GrayImage, min_degrees: f32) -> (GrayImage, f32, bool) {
    let skew = estimate_skew(&img);
    if skew.abs() <= min_degrees {
        return (img, skew, false);
    }
    let rotated = rotate_about_center(
        &img,
        -skew.to_radians(),
        Interpolation::Nearest,
        Luma([PAPER]),
    );
    (rotated, skew, true)
}
