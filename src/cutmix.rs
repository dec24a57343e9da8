/*!
# CutMix

This module implements the CutMix augmentation: a rectangular patch of one
image is pasted over another (crop-and-paste, not a blend) and the labels are
mixed by the realized pixel-area ratio.
 */

use rand::Rng;
use rand_distr::{Beta, Distribution};
use tch::{index::*, Tensor};

/**
A cut region inside a square image.

Invariants: `0 <= x`, `0 <= y`, `x + width <= image_size`,
`y + height <= image_size`, `width >= 1`, `height >= 1`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub height: i64,
    pub width: i64,
}

impl BoundingBox {
    pub fn area(&self) -> i64 {
        self.height * self.width
    }
}

/**
Derive the cut box for a given center point, deterministically.

The cut side is `trunc(image_size * sqrt(1 - mix_ratio))`; the box edges are
the center offset by half the cut side, clamped to `[0, image_size]`. An
extent clamped down to 0 is forced back to 1 so the box never degenerates to
an empty region.

# Arguments
- center: (i64, i64) - The (cx, cy) center of the cut, each in [0, image_size)
- mix_ratio: f64 - The mixing ratio in [0, 1]
- image_size: i64 - The side length of the (square) image

# Returns
BoundingBox - The clamped cut region
 */
pub fn box_from_center(center: (i64, i64), mix_ratio: f64, image_size: i64) -> BoundingBox {
    let (cx, cy) = center;
    let cut_ratio = (1.0 - mix_ratio).sqrt();
    let cut = (image_size as f64 * cut_ratio) as i64;
    let half = cut / 2;

    let x0 = (cx - half).clamp(0, image_size);
    let x1 = (cx + half).clamp(0, image_size);
    let y0 = (cy - half).clamp(0, image_size);
    let y1 = (cy + half).clamp(0, image_size);

    // cx and cy are < image_size, so widening a zero extent to 1 stays in bounds
    BoundingBox {
        x: x0,
        y: y0,
        height: (y1 - y0).max(1),
        width: (x1 - x0).max(1),
    }
}

/**
Sample a cut box for the given mixing ratio.

The center is drawn uniformly in `[0, image_size)` per axis from the passed
rng, then clamped as in [`box_from_center`].

# Arguments
- rng: &mut impl Rng - The random source
- mix_ratio: f64 - The mixing ratio in [0, 1]
- image_size: i64 - The side length of the (square) image

# Returns
BoundingBox - The sampled cut region
 */
pub fn sample_box(rng: &mut impl Rng, mix_ratio: f64, image_size: i64) -> BoundingBox {
    let cx = rng.gen_range(0..image_size);
    let cy = rng.gen_range(0..image_size);
    box_from_center((cx, cy), mix_ratio, image_size)
}

/**
Paste the box region of `image2` over `image1`.

Pixels outside the box come entirely from `image1`, pixels inside entirely
from `image2`. Inputs are untouched; a fresh tensor is returned.

# Arguments
- image1: Tensor - The base image [C, H, W]
- image2: Tensor - The patch donor [C, H, W], same shape as image1
- bb: &BoundingBox - The region to swap

# Returns
Tensor - The combined image [C, H, W]
 */
pub fn paste_box(image1: &Tensor, image2: &Tensor, bb: &BoundingBox) -> Tensor {
    let out = image1.copy();
    let region = (.., bb.y..bb.y + bb.height, bb.x..bb.x + bb.width);
    let mut window = out.i(region.clone());
    window.copy_(&image2.i(region));
    out
}

/**
The share of pixels kept from the base image once the box is clamped.

This is the *realized* ratio `1 - box_area / image_area`, which can differ
from the ideal continuous mixing ratio because the cut side is truncated and
the edges are clamped.
 */
pub fn effective_ratio(bb: &BoundingBox, image_size: i64) -> f64 {
    1.0 - bb.area() as f64 / (image_size * image_size) as f64
}

/**
CutMix combiner. Draws the mixing ratio from a Beta(alpha, alpha)
distribution and mixes labelled image pairs.
 */
#[derive(Debug, Clone)]
pub struct CutMix {
    alpha: f64,
    beta: Beta<f64>,
}

impl Default for CutMix {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl CutMix {
    /// Panics if `alpha` is not strictly positive.
    pub fn new(alpha: f64) -> Self {
        let beta = Beta::new(alpha, alpha).expect("beta parameter must be > 0");
        Self { alpha, beta }
    }

    /// The Beta concentration the mixing ratio is drawn with.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /**
    Combine two (image, label) pairs into one.

    Draws a fresh mixing ratio from Beta(alpha, alpha) and delegates to
    [`CutMix::combine_with_ratio`].

    # Arguments
    - rng: &mut impl Rng - The random source
    - (image1, label1): (&Tensor, &Tensor) - The base pair, [C, H, W] and [K]
    - (image2, label2): (&Tensor, &Tensor) - The donor pair, same shapes

    # Returns
    (Tensor, Tensor) - The mixed image [C, H, W] and label [K]
     */
    pub fn combine(
        &self,
        rng: &mut impl Rng,
        (image1, label1): (&Tensor, &Tensor),
        (image2, label2): (&Tensor, &Tensor),
    ) -> (Tensor, Tensor) {
        let mix_ratio = self.beta.sample(rng);
        self.combine_with_ratio(rng, (image1, label1), (image2, label2), mix_ratio)
    }

    /**
    Combine two (image, label) pairs for a fixed mixing ratio.

    The box is still sampled from the rng; the labels are blended by the
    realized ratio of the clamped box, so they stay a convex combination of
    the inputs.

    # Arguments
    - rng: &mut impl Rng - The random source for the box center
    - (image1, label1): (&Tensor, &Tensor) - The base pair, [C, H, W] and [K]
    - (image2, label2): (&Tensor, &Tensor) - The donor pair, same shapes
    - mix_ratio: f64 - The mixing ratio in [0, 1]

    # Returns
    (Tensor, Tensor) - The mixed image [C, H, W] and label [K]
     */
    pub fn combine_with_ratio(
        &self,
        rng: &mut impl Rng,
        (image1, label1): (&Tensor, &Tensor),
        (image2, label2): (&Tensor, &Tensor),
        mix_ratio: f64,
    ) -> (Tensor, Tensor) {
        let (_, height, width) = image1.size3().unwrap();
        assert_eq!(height, width, "cutmix expects square images");

        let bb = sample_box(rng, mix_ratio, height);
        let image = paste_box(image1, image2, &bb);

        let ratio = effective_ratio(&bb, height);
        let label = label1 * ratio + label2 * (1.0 - ratio);
        (image, label)
    }

    /**
    CutMix a whole batch in place of pairing two shuffled streams.

    Each sample is combined with a uniformly drawn partner from the same
    batch, with a fresh mixing ratio and box per pair.

    # Arguments
    - rng: &mut impl Rng - The random source
    - images: Tensor - The image batch [N, C, H, W]
    - labels: Tensor - The label batch [N, K]

    # Returns
    (Tensor, Tensor) - The mixed batch, same shapes as the inputs
     */
    pub fn combine_batch(
        &self,
        rng: &mut impl Rng,
        images: &Tensor,
        labels: &Tensor,
    ) -> (Tensor, Tensor) {
        let (n, _, _, _) = images.size4().unwrap();

        let mut out_images = Vec::with_capacity(n as usize);
        let mut out_labels = Vec::with_capacity(n as usize);
        for i in 0..n {
            let j = rng.gen_range(0..n);
            let (image, label) = self.combine(
                rng,
                (&images.get(i), &labels.get(i)),
                (&images.get(j), &labels.get(j)),
            );
            out_images.push(image);
            out_labels.push(label);
        }
        (Tensor::stack(&out_images, 0), Tensor::stack(&out_labels, 0))
    }
}
