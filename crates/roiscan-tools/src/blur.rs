//! Gaussian smoothing, the noise-reduction step of the line and circle
//! tools.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. The sigmas are fixed
//! per tool rather than exposed as parameters.

use image::GrayImage;

/// Sigma used by the line tool. Equivalent to the automatic sigma of a
/// 3x3 Gaussian kernel (`0.3 * ((3 - 1) * 0.5 - 1) + 0.8`).
pub const LINE_SIGMA: f32 = 0.8;

/// Sigma used by the circle tool (a 9x9 kernel with sigma 2).
pub const CIRCLE_SIGMA: f32 = 2.0;

/// Apply Gaussian blur to an intensity map.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc` panics on `sigma <= 0.0`. Zero-area images are returned
/// as is.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn non_positive_sigma_is_identity() {
        let img = step_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -2.0), img);
    }

    #[test]
    fn zero_area_is_returned_unchanged() {
        let img = GrayImage::new(0, 5);
        assert_eq!(gaussian_blur(&img, LINE_SIGMA).dimensions(), (0, 5));
    }

    #[test]
    fn blur_softens_step() {
        let blurred = gaussian_blur(&step_image(), CIRCLE_SIGMA);
        assert!(blurred.get_pixel(4, 5).0[0] > 0);
        assert!(blurred.get_pixel(5, 5).0[0] < 255);
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(12, 12, image::Luma([128]));
        for sigma in [LINE_SIGMA, CIRCLE_SIGMA] {
            for p in gaussian_blur(&img, sigma).pixels() {
                assert!(
                    (i16::from(p.0[0]) - 128).abs() <= 1,
                    "sigma {sigma}: got {}",
                    p.0[0]
                );
            }
        }
    }
}
