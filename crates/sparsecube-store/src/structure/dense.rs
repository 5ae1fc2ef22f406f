//! Dense materialisation

use super::DataStructure;
use crate::block::Block;
use ndarray::{ArrayD, Axis, IxDyn};
use sparsecube_common::{Error, Result};
use tracing::debug;

impl DataStructure {
    /// Scatter every block into a zero-filled array of shape
    /// `axes_len ++ block_shape`. All blocks must share one shape.
    pub fn to_dense(&self) -> Result<ArrayD<f64>> {
        let axes_len = self.axes()?.axes_len();
        let block_shape = self
            .objects
            .first()
            .map(|o| o.data.shape())
            .unwrap_or_default();

        let mut shape = axes_len.clone();
        shape.extend_from_slice(&block_shape);
        let mut dense = ArrayD::zeros(IxDyn(&shape));

        for object in &self.objects {
            let found = object.data.shape();
            if found != block_shape {
                return Err(Error::ShapeMismatch {
                    expected: block_shape,
                    found,
                });
            }
            let mut cell = dense.view_mut();
            for &position in object.index() {
                if position >= cell.len_of(Axis(0)) {
                    return Err(Error::internal(format!(
                        "object {} lies outside the axes",
                        object.id()
                    )));
                }
                cell = cell.index_axis_move(Axis(0), position);
            }
            match &object.data {
                Block::Scalar(value) => cell.fill(*value),
                Block::Dense(array) => cell.assign(array),
            }
        }
        Ok(dense)
    }

    /// Like [`Self::to_dense`], but the array is kept until the next
    /// mutation
    pub fn buffer_dense(&mut self) -> Result<&ArrayD<f64>> {
        if self.dense.is_none() {
            let dense = self.to_dense()?;
            debug!("buffered dense array of shape {:?}", dense.shape());
            self.dense = Some(dense);
        }
        self.dense
            .as_ref()
            .ok_or_else(|| Error::internal("dense buffer missing after fill"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{grid, line};
    use super::*;
    use ndarray::{Dimension, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_dense_scalars() {
        let ds = grid();
        let dense = ds.to_dense().unwrap();
        assert_eq!(dense.shape(), &[3, 2]);
        assert_eq!(dense[IxDyn(&[2, 1])], 21.0);
        assert_eq!(dense[IxDyn(&[0, 1])], 1.0);
    }

    #[test]
    fn test_dense_blocks_with_gap() {
        let mut ds = DataStructure::default();
        ds.add_data_object(array![1.0, 2.0].into_dyn(), vec![0], None)
            .unwrap();
        ds.add_data_object(array![3.0, 4.0].into_dyn(), vec![2], None)
            .unwrap();
        ds.validate().unwrap();

        let dense = ds.to_dense().unwrap();
        assert_eq!(
            dense,
            array![[1.0, 2.0], [0.0, 0.0], [3.0, 4.0]].into_dyn()
        );
    }

    #[test]
    fn test_dense_rejects_mixed_shapes() {
        let mut ds = DataStructure::default();
        ds.add_data_object(array![1.0, 2.0].into_dyn(), vec![0], None)
            .unwrap();
        ds.add_data_object(5.0, vec![1], None).unwrap();
        ds.validate().unwrap();
        assert_eq!(
            ds.to_dense(),
            Err(Error::ShapeMismatch {
                expected: vec![2],
                found: vec![]
            })
        );
    }

    #[test]
    fn test_dense_places_random_occupancy() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20 {
            let (rows, cols) = (rng.gen_range(1..6), rng.gen_range(1..6));
            let mut ds = DataStructure::default();
            let mut placed = Vec::new();
            for i in 0..rows {
                for j in 0..cols {
                    if placed.is_empty() || rng.gen_bool(0.6) {
                        let value: f64 = rng.gen_range(1.0..100.0);
                        ds.add_data_object(value, vec![i, j], None).unwrap();
                        placed.push((vec![i, j], value));
                    }
                }
            }
            ds.validate().unwrap();

            let dense = ds.to_dense().unwrap();
            assert_eq!(dense.shape(), ds.axes().unwrap().axes_len().as_slice());
            for (index, value) in &placed {
                assert_eq!(dense[IxDyn(index)], *value);
            }
            let nonzero = dense.iter().filter(|v| **v != 0.0).count();
            assert_eq!(nonzero, placed.len());
        }
    }

    #[test]
    fn test_dense_rescatter_is_bit_identical() {
        let mut rng = StdRng::seed_from_u64(0xd15c);
        let mut ds = DataStructure::default();
        for i in 0..3 {
            for j in 0..4 {
                // leave one hole inside the grid
                if (i, j) != (1, 2) {
                    let value: f64 = rng.gen_range(-50.0..50.0);
                    ds.add_data_object(value, vec![i, j], None).unwrap();
                }
            }
        }
        ds.validate().unwrap();
        let dense = ds.to_dense().unwrap();

        let mut rebuilt = DataStructure::default();
        for (index, value) in dense.indexed_iter() {
            rebuilt
                .add_data_object(*value, index.slice().to_vec(), None)
                .unwrap();
        }
        rebuilt.validate().unwrap();
        let again = rebuilt.to_dense().unwrap();

        assert_eq!(again.shape(), dense.shape());
        let bits = |a: &ArrayD<f64>| a.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&again), bits(&dense));
        assert_eq!(dense[IxDyn(&[1, 2])].to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn test_buffer_dense_is_dropped_on_mutation() {
        let mut ds = line(&[1.0, 2.0]);
        assert_eq!(ds.buffer_dense().unwrap(), &array![1.0, 2.0].into_dyn());
        assert!(ds.dense.is_some());

        ds.add_data_object(3.0, vec![2], None).unwrap();
        assert!(ds.dense.is_none());
        assert_eq!(ds.buffer_dense().unwrap(), &array![1.0, 2.0, 3.0].into_dyn());
    }
}
