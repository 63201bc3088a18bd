//! Canvas pixel pipeline: decode, alpha flatten, grayscale, crop, resize

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use ndarray::{Array2, Array3};

use crate::error::Result;

/// Background the transparent canvas is composited onto
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Decode a PNG snapshot and composite it onto [`BACKGROUND`]
pub fn decode_canvas(png: &[u8]) -> Result<RgbImage> {
    let rgba = image::load_from_memory(png)?.to_rgba8();
    Ok(flatten_alpha(&rgba, BACKGROUND))
}

/// Composite RGBA pixels onto a solid background
#[must_use]
pub fn flatten_alpha(rgba: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let px = rgba.get_pixel(x, y);
        let alpha = u32::from(px[3]);
        let blend = |c: u8, bg: u8| {
            let mixed = (u32::from(c) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255;
            mixed as u8
        };
        Rgb([
            blend(px[0], background[0]),
            blend(px[1], background[1]),
            blend(px[2], background[2]),
        ])
    })
}

/// BT.601 luma
#[must_use]
pub fn grayscale(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Keep the top-left `height` rows and `width` columns (clamped to the image)
#[must_use]
pub fn crop_top_left(gray: &GrayImage, height: u32, width: u32) -> GrayImage {
    let width = width.min(gray.width());
    let height = height.min(gray.height());
    imageops::crop_imm(gray, 0, 0, width, height).to_image()
}

/// Bilinear resize
#[must_use]
pub fn resize(gray: &GrayImage, width: u32, height: u32) -> GrayImage {
    imageops::resize(gray, width, height, FilterType::Triangle)
}

/// `[height, width, 1]` integer pixels
#[must_use]
pub fn gray_to_u8(gray: &GrayImage) -> Array3<u8> {
    Array3::from_shape_fn(
        (gray.height() as usize, gray.width() as usize, 1),
        |(y, x, _)| gray.get_pixel(x as u32, y as u32)[0],
    )
}

/// `[height, width]` pixels scaled to `[0, 1]`
#[must_use]
pub fn gray_to_unit(gray: &GrayImage) -> Array2<f32> {
    Array2::from_shape_fn(
        (gray.height() as usize, gray.width() as usize),
        |(y, x)| f32::from(gray.get_pixel(x as u32, y as u32)[0]) / 255.0,
    )
}

/// `[height, width, 3]` integer pixels
#[must_use]
pub fn rgb_to_u8(rgb: &RgbImage) -> Array3<u8> {
    Array3::from_shape_fn(
        (rgb.height() as usize, rgb.width() as usize, 3),
        |(y, x, c)| rgb.get_pixel(x as u32, y as u32)[c],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_flatten_alpha() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([83, 83, 83, 255]));

        let rgb = flatten_alpha(&rgba, BACKGROUND);
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([83, 83, 83]));
    }

    #[test]
    fn test_half_transparent_blends() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        let rgb = flatten_alpha(&rgba, BACKGROUND);
        assert_eq!(rgb.get_pixel(0, 0)[0], 127);
    }

    #[test]
    fn test_grayscale_weights() {
        let mut rgb = RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, Rgb([83, 83, 83]));

        let gray = grayscale(&rgb);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 83);
    }

    #[test]
    fn test_crop_is_clamped() {
        let gray = GrayImage::new(600, 150);
        let cropped = crop_top_left(&gray, 300, 500);
        assert_eq!(cropped.dimensions(), (500, 150));
    }

    #[test]
    fn test_array_layouts() {
        let mut gray = GrayImage::new(3, 2);
        gray.put_pixel(2, 1, Luma([255]));

        let ints = gray_to_u8(&gray);
        assert_eq!(ints.shape(), &[2, 3, 1]);
        assert_eq!(ints[[1, 2, 0]], 255);

        let unit = gray_to_unit(&gray);
        assert_eq!(unit.shape(), &[2, 3]);
        approx::assert_relative_eq!(unit[[1, 2]], 1.0);
        approx::assert_relative_eq!(unit[[0, 0]], 0.0);

        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(1, 0, Rgb([1, 2, 3]));
        let colour = rgb_to_u8(&rgb);
        assert_eq!(colour.shape(), &[1, 2, 3]);
        assert_eq!(colour[[0, 1, 2]], 3);
    }
}
