/*!
 * # Tch-gan-utils - CutMix and WGAN-GP training utilities for the tch-rs crate
 *
 * > *Note :* This crate collects the augmentation and GAN-training glue I use in
 * > my image projects. The heavy lifting (autodiff, conv kernels, optimizers,
 * > batching) stays in tch; what lives here is the tensor arithmetic around it.
 *
 * ## Features
 * - CutMix : sample a cut box and paste it between labelled images
 * - WGAN-GP : gradient penalty and the two-phase critic/generator step
 * - Snapshots : periodically dump generated samples as PNG files
 *
 * ## Conventions
 *
 * ### Shapes
 * - N : The number of samples
 * - C : The number of channels
 * - H : The height of the image
 * - W : The width of the image
 * - K : The number of classes
 *
 * - [N, C, H, W] : a batch of N images of shape [C, H, W]
 * - [C, H, W] : a single image
 * - [N, K] / [K] : class distributions (one-hot or soft), entries sum to 1
 *
 * Classifier-side images are float in [0, 1]; GAN-side images are float in
 * [-1, 1] and get mapped back to pixel range when written out.
 *
 * ### Axis
 *
 * the y axis will always be top to bottom
 * the x axis will always be left to right
 *
 * ### Randomness
 *
 * Every sampling entry point takes a `&mut impl rand::Rng` handle. The crate
 * keeps no global seed state; seed a `StdRng` once and thread it through.
 */

pub mod cutmix;
pub mod tensor_ext;
pub mod utils;
pub mod wgan;

#[cfg(feature = "image")]
pub mod image;
#[cfg(feature = "image")]
pub mod snapshot;
