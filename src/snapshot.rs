/*!
# Snapshots

Periodic dump of generated samples to disk, meant to be called from an
epoch-end hook of the training loop. File names follow the
`generated_img_{sample}_{epoch}.png` pattern.
 */

use std::path::{Path, PathBuf};

use rand::Rng;
use tch::Tensor;
use thiserror::Error;

use crate::image::ImageTensorExt;
use crate::wgan::latent_noise;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to create snapshot directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
}

/**
Writes a fixed number of generated samples at the end of an epoch.

The generator is run under `no_grad`; its [-1, 1] output is mapped back to
[0, 1] before encoding.
 */
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    pub num_images: i64,
    pub latent_dim: i64,
    directory: PathBuf,
}

impl SnapshotWriter {
    pub fn new(num_images: i64, latent_dim: i64, directory: impl AsRef<Path>) -> Self {
        Self {
            num_images,
            latent_dim,
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /**
    Generate and save `num_images` samples for the given epoch.

    # Arguments
    - rng: &mut impl Rng - The random source for the latent batch
    - generator: Fn(&Tensor) -> Tensor - [N, latent_dim] -> [N, C, H, W]
    - epoch: usize - The epoch index, used in the file names
    - options: (tch::Kind, tch::Device) - The kind and device of the latent batch

    # Returns
    Vec<PathBuf> - The paths of the written files
     */
    pub fn write<G>(
        &self,
        rng: &mut impl Rng,
        generator: &G,
        epoch: usize,
        options: (tch::Kind, tch::Device),
    ) -> Result<Vec<PathBuf>, SnapshotError>
    where
        G: Fn(&Tensor) -> Tensor,
    {
        std::fs::create_dir_all(&self.directory)?;

        let noise = latent_noise(rng, self.num_images, self.latent_dim, options);
        let images = tch::no_grad(|| generator(&noise));
        let images = ((images + 1.0) * 0.5).to_device(tch::Device::Cpu);

        let mut paths = Vec::with_capacity(self.num_images as usize);
        for i in 0..self.num_images {
            let path = self
                .directory
                .join(format!("generated_img_{}_{}.png", i, epoch));
            images.get(i).to_image().save(&path)?;
            log::info!("saved generated sample to {}", path.display());
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tch::{Device, Kind};

    #[test]
    fn writes_one_file_per_sample() {
        let dir = std::env::temp_dir().join("tch-gan-utils-snapshot-test");
        let _ = std::fs::remove_dir_all(&dir);

        let writer = SnapshotWriter::new(3, 8, &dir);
        // a generator that paints constant gray images
        let generator = |z: &Tensor| Tensor::zeros(&[z.size()[0], 3, 4, 4], (Kind::Float, Device::Cpu));

        let mut rng = StdRng::seed_from_u64(2);
        let paths = writer
            .write(&mut rng, &generator, 7, (Kind::Float, Device::Cpu))
            .unwrap();

        assert_eq!(paths.len(), 3);
        assert!(dir.join("generated_img_0_7.png").exists());
        assert!(dir.join("generated_img_2_7.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
