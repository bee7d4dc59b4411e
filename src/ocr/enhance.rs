use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Grayscale with boosted contrast and sharpness; no binarization.
pub fn enhance_for_ocr(input: &DynamicImage, contrast: f32, sharpness: f32) -> GrayImage {
    let gray = input.to_luma8();
    let contrasted = enhance_contrast(&gray, contrast);
    enhance_sharpness(&contrasted, sharpness)
}

/// Blends every pixel away from the mean intensity by `factor`.
pub fn enhance_contrast(img: &GrayImage, factor: f32) -> GrayImage {
    let count = (img.width() as u64 * img.height() as u64).max(1);
    let sum: u64 = img.pixels().map(|p| p.0[0] as u64).sum();
    let mean = (sum as f32 / count as f32).round();
    blend(img, |_, _| mean, factor)
}

/// Blends every pixel away from a smoothed copy by `factor`.
pub fn enhance_sharpness(img: &GrayImage, factor: f32) -> GrayImage {
    let smooth = gaussian_blur_f32(img, 1.0);
    blend(img, |x, y| smooth.get_pixel(x, y).0[0] as f32, factor)
}

fn blend(img: &GrayImage, base: impl Fn(u32, u32) -> f32, factor: f32) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let degenerate = base(x, y);
        let v = degenerate + factor * (img.get_pixel(x, y).0[0] as f32 - degenerate);
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}
