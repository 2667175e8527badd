//! Strassen's recurrence: the seven operand pairs of one split and the
//! formulas that recombine their products.
//!
//! Products are numbered `p1..p7` and always handled in that order; the
//! partition and merge engines both depend on it.

use hypergrid_core::{Block, BlockError};

/// Split both operands and form the seven `(left, right)` pairs whose
/// products are `p1..p7`.
pub fn operand_pairs(a: &Block, b: &Block) -> Result<[(Block, Block); 7], BlockError> {
    let [a11, a12, a21, a22] = a.split()?;
    let [b11, b12, b21, b22] = b.split()?;
    Ok([
        (a11.clone(), b12.sub(&b22)?),
        (a11.add(&a12)?, b22.clone()),
        (a21.add(&a22)?, b11.clone()),
        (a22.clone(), b21.sub(&b11)?),
        (a11.add(&a22)?, b11.add(&b22)?),
        (a12.sub(&a22)?, b21.add(&b22)?),
        (a11.sub(&a21)?, b11.add(&b12)?),
    ])
}

/// Recombine `p1..p7` into the parent product.
pub fn combine(p: &[Block; 7]) -> Result<Block, BlockError> {
    let [p1, p2, p3, p4, p5, p6, p7] = p;
    let c11 = p5.add(p4)?.sub(p2)?.add(p6)?;
    let c12 = p1.add(p2)?;
    let c21 = p3.add(p4)?;
    let c22 = p1.add(p5)?.sub(p3)?.sub(p7)?;
    Block::join(&c11, &c12, &c21, &c22)
}

/// In-process Strassen product, recursing down to `block_size` and using the
/// naive kernel there. Reference for the distributed result.
pub fn multiply(a: &Block, b: &Block, block_size: usize) -> Result<Block, BlockError> {
    if a.side() <= block_size {
        return a.multiply(b);
    }
    let pairs = operand_pairs(a, b)?;
    let product = |k: usize| multiply(&pairs[k].0, &pairs[k].1, block_size);
    let p = [
        product(0)?,
        product(1)?,
        product(2)?,
        product(3)?,
        product(4)?,
        product(5)?,
        product(6)?,
    ];
    combine(&p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_random(side: usize, seed: u64) -> Block {
        let mut state = seed;
        let data = (0..side * side)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) % 19) as f64 - 9.0
            })
            .collect();
        Block::from_vec(side, data).unwrap()
    }

    #[test]
    fn one_level_matches_hand_computed_product() {
        let a = Block::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Block::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap();
        let c = multiply(&a, &b, 1).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn first_level_products_for_the_2x2_case() {
        let a = Block::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Block::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap();
        let products: Vec<f64> = operand_pairs(&a, &b)
            .unwrap()
            .iter()
            .map(|(l, r)| l.get(0, 0) * r.get(0, 0))
            .collect();
        // p1 = 1*(6-8), p2 = (1+2)*8, p3 = (3+4)*5, p4 = 4*(7-5),
        // p5 = (1+4)*(5+8), p6 = (2-4)*(7+8), p7 = (1-3)*(5+6)
        assert_eq!(products, vec![-2.0, 24.0, 35.0, 8.0, 65.0, -30.0, -22.0]);
    }

    #[test]
    fn matches_naive_product_at_several_depths() {
        for (side, block_size) in [(4, 1), (8, 2), (16, 4), (16, 16)] {
            let a = pseudo_random(side, 1);
            let b = pseudo_random(side, 2);
            let expected = a.multiply(&b).unwrap();
            assert_eq!(multiply(&a, &b, block_size).unwrap(), expected);
        }
    }

    #[test]
    fn odd_split_is_an_error() {
        let a = Block::zeros(3);
        assert!(operand_pairs(&a, &a).is_err());
    }
}
