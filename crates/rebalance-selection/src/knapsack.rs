//! 0/1 knapsack over integer weights.
//!
//! Dynamic programming over capacity: `best[i][c]` is the highest value
//! reachable with the first `i` items in `c` units. The chosen indices are
//! recovered by walking the table backwards, so each index appears once and
//! in ascending order.

/// One candidate with integer weight and real value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    pub weight: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    /// Indices into the input slice, ascending.
    pub chosen: Vec<usize>,
    pub weight: usize,
    pub value: f64,
}

impl Solution {
    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// Maximize total value subject to `Σ weight <= capacity`.
///
/// Items with non-positive value are never chosen. On equal value the
/// solution that leaves the later item out wins. The table never grows past
/// the total item weight, whatever `capacity` is.
pub fn solve(capacity: usize, items: &[Item]) -> Solution {
    let total_weight = items
        .iter()
        .fold(0usize, |sum, item| sum.saturating_add(item.weight));
    let capacity = capacity.min(total_weight);
    let n = items.len();
    let width = capacity + 1;
    let mut best = vec![0.0_f64; (n + 1) * width];
    let mut take = vec![false; n * width];

    for (i, item) in items.iter().enumerate() {
        for c in 0..width {
            let skip = best[i * width + c];
            let mut value = skip;
            if item.weight <= c && item.value > 0.0 {
                let with = best[i * width + c - item.weight] + item.value;
                if with > skip {
                    value = with;
                    take[i * width + c] = true;
                }
            }
            best[(i + 1) * width + c] = value;
        }
    }

    let mut chosen = Vec::new();
    let mut c = capacity;
    for i in (0..n).rev() {
        if take[i * width + c] {
            chosen.push(i);
            c -= items[i].weight;
        }
    }
    chosen.reverse();

    let weight = chosen.iter().map(|&i| items[i].weight).sum();
    let value = chosen.iter().map(|&i| items[i].value).sum();
    Solution {
        chosen,
        weight,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(spec: &[(usize, f64)]) -> Vec<Item> {
        spec.iter()
            .map(|&(weight, value)| Item { weight, value })
            .collect()
    }

    /// Best value over every subset; only usable for small inputs.
    fn brute_force(capacity: usize, items: &[Item]) -> f64 {
        let mut best = 0.0_f64;
        for mask in 0u32..(1 << items.len()) {
            let (mut w, mut v) = (0, 0.0);
            for (i, item) in items.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    w += item.weight;
                    v += item.value;
                }
            }
            if w <= capacity && v > best {
                best = v;
            }
        }
        best
    }

    #[test]
    fn picks_best_pair_under_capacity() {
        // ow, oq, mr (relocated once), ot
        let items = items(&[(20, 20.0), (16, 16.0), (33, 16.5), (17, 17.0)]);
        let solution = solve(50, &items);
        assert_eq!(solution.chosen, vec![0, 3]);
        assert_eq!(solution.weight, 37);
        assert_eq!(solution.value, 37.0);
    }

    #[test]
    fn unpenalized_fills_capacity() {
        let items = items(&[(20, 20.0), (16, 16.0), (33, 33.0), (17, 17.0)]);
        let solution = solve(50, &items);
        assert_eq!(solution.chosen, vec![2, 3]);
        assert_eq!(solution.weight, 50);
    }

    #[test]
    fn nothing_fits() {
        let items = items(&[(30, 30.0), (40, 40.0)]);
        assert!(solve(20, &items).is_empty());
        assert!(solve(20, &[]).is_empty());
        assert!(solve(0, &items).is_empty());
    }

    #[test]
    fn huge_capacity_is_bounded_by_item_weight() {
        let items = items(&[(20, 20.0), (16, 16.0), (33, 8.25)]);
        let solution = solve(usize::MAX, &items);
        assert_eq!(solution.chosen, vec![0, 1, 2]);
        assert_eq!(solution.weight, 69);
        assert_eq!(solve(usize::MAX / 2, &items), solution);
    }

    #[test]
    fn zero_weight_items_fit_anywhere() {
        let items = items(&[(0, 0.5), (10, 10.0)]);
        let solution = solve(0, &items);
        assert_eq!(solution.chosen, vec![0]);
    }

    #[test]
    fn matches_exhaustive_search() {
        let cases: &[(usize, &[(usize, f64)])] = &[
            (10, &[(5, 10.0), (4, 40.0), (6, 30.0), (3, 50.0)]),
            (50, &[(10, 60.0), (20, 100.0), (30, 120.0)]),
            (7, &[(1, 1.0), (3, 4.0), (4, 5.0), (5, 7.0)]),
            (26, &[(12, 24.0), (7, 13.0), (11, 23.0), (8, 15.0), (9, 16.0)]),
            (
                100,
                &[
                    (23, 11.5),
                    (31, 31.0),
                    (29, 7.25),
                    (44, 44.0),
                    (53, 26.5),
                    (38, 38.0),
                    (63, 63.0),
                    (85, 85.0),
                    (89, 22.25),
                    (82, 82.0),
                ],
            ),
        ];
        for (capacity, spec) in cases {
            let items = items(spec);
            let solution = solve(*capacity, &items);
            let expected = brute_force(*capacity, &items);

            assert!(solution.weight <= *capacity);
            assert!(
                (solution.value - expected).abs() < 1e-9,
                "capacity {capacity}: dp {} vs exhaustive {expected}",
                solution.value
            );
            let mut dedup = solution.chosen.clone();
            dedup.dedup();
            assert_eq!(dedup, solution.chosen);
            assert!(solution.chosen.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
