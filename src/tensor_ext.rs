/*!
Contains diverse extensions to the Tensor struct.
 */

use tch::Tensor;

pub trait TensorExt {
    fn sum_dim(&self, dim: i64) -> Tensor;
    /// L2 norm per sample, flattened over every non-batch dimension.
    /// [N, ...] -> [N]
    fn l2_per_sample(&self) -> Tensor;
}

impl TensorExt for Tensor {
    fn sum_dim(&self, dim: i64) -> Tensor {
        let typ = self.kind();
        self.sum_dim_intlist(Some(&[dim][..]), false, typ)
    }

    fn l2_per_sample(&self) -> Tensor {
        let n = self.size()[0];
        self.view([n, -1]).square().sum_dim(1).sqrt()
    }
}
