use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BlockError;

/// A square, row-major matrix of `f64`.
///
/// The same type is used for the full input matrices, every intermediate
/// operand in the recursion tree, and the leaf blocks shipped to workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    side: usize,
    data: Vec<f64>,
}

impl Block {
    /// Build a block from row-major values. `data.len()` must equal `side * side`.
    pub fn from_vec(side: usize, data: Vec<f64>) -> Result<Self, BlockError> {
        if data.len() != side * side {
            return Err(BlockError::NotSquare {
                expected: side * side,
                actual: data.len(),
            });
        }
        Ok(Self { side, data })
    }

    /// Build a block from nested rows. Every row must have as many entries as
    /// there are rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, BlockError> {
        let side = rows.len();
        let mut data = Vec::with_capacity(side * side);
        for row in rows {
            let row = row.as_ref();
            if row.len() != side {
                return Err(BlockError::NotSquare {
                    expected: side * side,
                    actual: side * row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { side, data })
    }

    pub fn zeros(side: usize) -> Self {
        Self {
            side,
            data: vec![0.0; side * side],
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// Row-major view of the values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.side + col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics, and an empty block has no rows anyway.
        self.data.chunks(self.side.max(1))
    }

    pub fn add(&self, other: &Block) -> Result<Block, BlockError> {
        self.zip_with(other, |x, y| x + y)
    }

    pub fn sub(&self, other: &Block) -> Result<Block, BlockError> {
        self.zip_with(other, |x, y| x - y)
    }

    fn zip_with(&self, other: &Block, f: impl Fn(f64, f64) -> f64) -> Result<Block, BlockError> {
        if self.side != other.side {
            return Err(BlockError::DimensionMismatch {
                left: self.side,
                right: other.side,
            });
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&x, &y)| f(x, y))
            .collect();
        Ok(Block {
            side: self.side,
            data,
        })
    }

    /// Split into `[M11, M12, M21, M22]`, each of side `n/2`.
    pub fn split(&self) -> Result<[Block; 4], BlockError> {
        if self.side % 2 != 0 {
            return Err(BlockError::OddSide(self.side));
        }
        let half = self.side / 2;
        let quadrant = |row0: usize, col0: usize| {
            let mut data = Vec::with_capacity(half * half);
            for row in row0..row0 + half {
                let start = row * self.side + col0;
                data.extend_from_slice(&self.data[start..start + half]);
            }
            Block { side: half, data }
        };
        Ok([
            quadrant(0, 0),
            quadrant(0, half),
            quadrant(half, 0),
            quadrant(half, half),
        ])
    }

    /// Inverse of [`Block::split`]: stitch four equal quadrants back together.
    pub fn join(q11: &Block, q12: &Block, q21: &Block, q22: &Block) -> Result<Block, BlockError> {
        let half = q11.side;
        for q in [q12, q21, q22] {
            if q.side != half {
                return Err(BlockError::DimensionMismatch {
                    left: half,
                    right: q.side,
                });
            }
        }
        let side = half * 2;
        let mut data = Vec::with_capacity(side * side);
        for (left, right) in [(q11, q12), (q21, q22)] {
            for row in 0..half {
                let range = row * half..(row + 1) * half;
                data.extend_from_slice(&left.data[range.clone()]);
                data.extend_from_slice(&right.data[range]);
            }
        }
        Ok(Block { side, data })
    }

    /// Naive O(n³) product. Used as the reference kernel.
    pub fn multiply(&self, other: &Block) -> Result<Block, BlockError> {
        if self.side != other.side {
            return Err(BlockError::DimensionMismatch {
                left: self.side,
                right: other.side,
            });
        }
        let n = self.side;
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for k in 0..n {
                let a = self.data[i * n + k];
                let row = &other.data[k * n..(k + 1) * n];
                for (out, &b) in data[i * n..(i + 1) * n].iter_mut().zip(row) {
                    *out += a * b;
                }
            }
        }
        Ok(Block { side: n, data })
    }
}

/// One row per line, values separated by single spaces.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let mut first = true;
            for value in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{value}")?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(side: usize) -> Block {
        let data = (0..side * side).map(|v| v as f64).collect();
        Block::from_vec(side, data).unwrap()
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Block::from_vec(2, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, BlockError::NotSquare { expected: 4, actual: 3 });
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Block::from_rows(&rows).is_err());
    }

    #[test]
    fn add_and_sub_are_elementwise() {
        let a = Block::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Block::from_rows(&[[10.0, 20.0], [30.0, 40.0]]).unwrap();
        assert_eq!(a.add(&b).unwrap().as_slice(), &[11.0, 22.0, 33.0, 44.0]);
        assert_eq!(b.sub(&a).unwrap().as_slice(), &[9.0, 18.0, 27.0, 36.0]);
    }

    #[test]
    fn mismatched_sides_are_rejected() {
        let err = counting(2).add(&counting(4)).unwrap_err();
        assert_eq!(err, BlockError::DimensionMismatch { left: 2, right: 4 });
        assert!(counting(2).multiply(&counting(4)).is_err());
    }

    #[test]
    fn split_takes_row_major_quadrants() {
        let m = counting(4);
        let [q11, q12, q21, q22] = m.split().unwrap();
        assert_eq!(q11.as_slice(), &[0.0, 1.0, 4.0, 5.0]);
        assert_eq!(q12.as_slice(), &[2.0, 3.0, 6.0, 7.0]);
        assert_eq!(q21.as_slice(), &[8.0, 9.0, 12.0, 13.0]);
        assert_eq!(q22.as_slice(), &[10.0, 11.0, 14.0, 15.0]);
    }

    #[test]
    fn join_inverts_split() {
        for side in [2, 4, 6, 8] {
            let m = counting(side);
            let [a, b, c, d] = m.split().unwrap();
            assert_eq!(Block::join(&a, &b, &c, &d).unwrap(), m);
        }
    }

    #[test]
    fn split_rejects_odd_side() {
        assert_eq!(counting(3).split().unwrap_err(), BlockError::OddSide(3));
    }

    #[test]
    fn join_rejects_unequal_quadrants() {
        let small = counting(1);
        let big = counting(2);
        assert!(Block::join(&small, &small, &small, &big).is_err());
    }

    #[test]
    fn multiply_matches_hand_computed_product() {
        let a = Block::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Block::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap();
        let c = a.multiply(&b).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn display_prints_one_row_per_line() {
        let a = Block::from_rows(&[[1.0, 2.5], [3.0, -4.0]]).unwrap();
        assert_eq!(a.to_string(), "1 2.5\n3 -4\n");
    }
}
