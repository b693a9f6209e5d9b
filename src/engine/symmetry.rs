use std::ops::Range;

use crate::engine::FeatureMatrix;

/// All orderings of `n` interchangeable piece colours.
///
/// Feature encoders typically store one value per colour per cell, with the
/// colours interleaved (`cell * n + colour`). Relabelling the colours does
/// not change the game, so every training row can be expanded into one row
/// per ordering. Orderings are enumerated lexicographically, identity first.
#[derive(Debug, Clone)]
pub struct ColorPermutations {
    colors: usize,
    orders: Vec<Vec<usize>>,
}

impl ColorPermutations {
    pub fn new(colors: usize) -> Self {
        let mut order: Vec<usize> = (0..colors).collect();
        let mut orders = vec![order.clone()];
        while next_permutation(&mut order) {
            orders.push(order.clone());
        }
        ColorPermutations { colors, orders }
    }

    pub fn colors(&self) -> usize {
        self.colors
    }

    /// Number of orderings, `colors!`.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Vec<usize>] {
        &self.orders
    }

    /// Expand every row of `input` under every ordering.
    ///
    /// `colored` lists the column ranges holding interleaved colour channels;
    /// columns outside them are copied unchanged. Output row `i * len() + r`
    /// is input row `i` relabelled by ordering `r`.
    ///
    /// # Panics
    ///
    /// If a range is not a multiple of `colors` wide or exceeds the row.
    pub fn rotate(&self, input: &FeatureMatrix, colored: &[Range<usize>]) -> FeatureMatrix {
        for range in colored {
            assert!(
                range.end <= input.cols() && range.len() % self.colors == 0,
                "colour range {:?} does not tile rows of width {} by {} colours",
                range,
                input.cols(),
                self.colors
            );
        }

        let k = self.orders.len();
        let mut out = FeatureMatrix::zeros(input.rows() * k, input.cols());
        for i in 0..input.rows() {
            let src = input.row(i);
            for (r, order) in self.orders.iter().enumerate() {
                let dst = out.row_mut(i * k + r);
                dst.copy_from_slice(src);
                for range in colored {
                    for base in range.clone().step_by(self.colors) {
                        for (c, &to) in order.iter().enumerate() {
                            dst[base + to] = src[base + c];
                        }
                    }
                }
            }
        }
        out
    }
}

/// Advance `v` to its next lexicographic permutation. Returns `false` (and
/// leaves `v` sorted ascending) after the last one.
fn next_permutation(v: &mut [usize]) -> bool {
    if v.len() < 2 {
        return false;
    }
    let mut i = v.len() - 1;
    while i > 0 && v[i - 1] >= v[i] {
        i -= 1;
    }
    if i == 0 {
        v.reverse();
        return false;
    }
    let mut j = v.len() - 1;
    while v[j] <= v[i - 1] {
        j -= 1;
    }
    v.swap(i - 1, j);
    v[i..].reverse();
    true
}
