/*!
Conversions between [C, H, W] float tensors and `image` crate images.
 */

use image::{DynamicImage, GrayImage, RgbImage};
use tch::{Kind, Tensor};

pub trait ImageTensorExt {
    /// [C, H, W] float in [0, 1] -> image. Supports 1 and 3 channels.
    fn to_image(&self) -> DynamicImage;

    /// image -> [3, H, W] float in [0, 1].
    fn from_image(image: DynamicImage) -> Self;
}

impl ImageTensorExt for Tensor {
    fn to_image(&self) -> DynamicImage {
        let (channels, height, width) = self.size3().unwrap();
        let pixels = (self.clamp(0.0, 1.0) * 255.0)
            .to_kind(Kind::Uint8)
            .permute(&[1, 2, 0])
            .contiguous();
        let data = Vec::<u8>::from(&pixels);
        match channels {
            1 => DynamicImage::ImageLuma8(
                GrayImage::from_raw(width as u32, height as u32, data).unwrap(),
            ),
            3 => DynamicImage::ImageRgb8(
                RgbImage::from_raw(width as u32, height as u32, data).unwrap(),
            ),
            _ => panic!("expected 1 or 3 channels, got {}", channels),
        }
    }

    fn from_image(image: DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Tensor::of_slice(rgb.as_raw())
            .view([height as i64, width as i64, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
            / 255.0
    }
}
