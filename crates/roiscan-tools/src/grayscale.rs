//! Cropping and intensity conversion.
//!
//! The first stage shared by every tool: validate the channel layout,
//! crop to the clamped ROI (or keep the whole image), and reduce to a
//! single-channel intensity map.

use image::{DynamicImage, GrayImage};

use crate::types::{DetectionError, Region};

/// Channel counts the tools accept.
pub const SUPPORTED_CHANNELS: [u8; 2] = [1, 3];

/// Reject images whose channel count is not 1 or 3.
///
/// # Errors
///
/// Returns [`DetectionError::InvalidImageFormat`] for any other layout
/// (e.g. RGBA or luma+alpha).
pub fn check_channels(image: &DynamicImage) -> Result<(), DetectionError> {
    let channels = image.color().channel_count();
    if SUPPORTED_CHANNELS.contains(&channels) {
        Ok(())
    } else {
        Err(DetectionError::InvalidImageFormat { channels })
    }
}

/// Crop `image` to `region` (or take all of it when `None`) and convert
/// the result to single-channel intensity.
///
/// 3-channel images use the `image` crate's luma weights (Rec. 709:
/// `0.2126*R + 0.7152*G + 0.0722*B`); 1-channel images are copied as is.
/// The input is never mutated.
///
/// # Errors
///
/// Returns [`DetectionError::InvalidImageFormat`] if the image is not 1
/// or 3 channels.
#[must_use = "returns the cropped intensity map"]
pub fn crop_to_intensity(
    image: &DynamicImage,
    region: Option<Region>,
) -> Result<GrayImage, DetectionError> {
    check_channels(image)?;
    let gray = match region {
        Some(r) => image.crop_imm(r.x, r.y, r.width, r.height).to_luma8(),
        None => image.to_luma8(),
    };
    Ok(gray)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
        #[allow(clippy::cast_possible_truncation)]
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 10 % 256) as u8, (y * 10 % 256) as u8, 0])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn rgba_is_rejected() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4));
        let result = crop_to_intensity(&img, None);
        assert_eq!(
            result,
            Err(DetectionError::InvalidImageFormat { channels: 4 })
        );
    }

    #[test]
    fn luma_alpha_is_rejected() {
        let img = DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(4, 4));
        assert_eq!(
            check_channels(&img),
            Err(DetectionError::InvalidImageFormat { channels: 2 })
        );
    }

    #[test]
    fn gray_and_rgb_are_accepted() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        assert!(check_channels(&gray).is_ok());
        assert!(check_channels(&gradient_rgb(3, 3)).is_ok());
    }

    #[test]
    fn full_image_when_no_region() {
        let out = crop_to_intensity(&gradient_rgb(17, 31), None).unwrap();
        assert_eq!(out.dimensions(), (17, 31));
    }

    #[test]
    fn crop_takes_region_pixels() {
        let src = GrayImage::from_fn(20, 20, |x, y| image::Luma([u8::try_from(x + y).unwrap()]));
        let img = DynamicImage::ImageLuma8(src);
        let region = Region {
            x: 5,
            y: 7,
            width: 4,
            height: 3,
        };
        let out = crop_to_intensity(&img, Some(region)).unwrap();
        assert_eq!(out.dimensions(), (4, 3));
        assert_eq!(out.get_pixel(0, 0).0[0], 12);
        assert_eq!(out.get_pixel(3, 2).0[0], 8 + 9);
    }

    #[test]
    fn green_is_brighter_than_red_is_brighter_than_blue() {
        let luma = |rgb: [u8; 3]| {
            let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb(rgb)));
            crop_to_intensity(&img, None).unwrap().get_pixel(0, 0).0[0]
        };
        let (r, g, b) = (luma([255, 0, 0]), luma([0, 255, 0]), luma([0, 0, 255]));
        assert!(g > r && r > b, "R={r} G={g} B={b}");
    }

    #[test]
    fn rgb_uses_rec709_weights() {
        let luma = |rgb: [u8; 3]| {
            let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb(rgb)));
            i16::from(crop_to_intensity(&img, None).unwrap().get_pixel(0, 0).0[0])
        };
        assert!((luma([255, 0, 0]) - 54).abs() <= 1);
        assert!((luma([0, 255, 0]) - 182).abs() <= 1);
        assert!((luma([0, 0, 255]) - 18).abs() <= 1);
    }

    #[test]
    fn source_is_not_mutated() {
        let img = gradient_rgb(10, 10);
        let before = img.clone();
        let region = Region {
            x: 2,
            y: 2,
            width: 5,
            height: 5,
        };
        let _ = crop_to_intensity(&img, Some(region)).unwrap();
        assert_eq!(img, before);
    }
}
