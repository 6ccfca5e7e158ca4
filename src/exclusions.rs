use std::collections::HashMap;

use bit_set::BitSet;

use crate::core::CellIndex;

/// Precomputed mutual-exclusion graph between cells: for each cell, the set
/// of cells that must take a different value, as the union of every
/// handler's exclusion group containing the cell. Exposed as sorted arrays,
/// plus two intersection caches that handlers populate on demand during
/// initialization and read afterwards.
#[derive(Debug, Clone)]
pub struct CellExclusions {
    by_cell: Vec<Box<[CellIndex]>>,
    pair_cache: HashMap<(CellIndex, CellIndex), Box<[CellIndex]>>,
    list_cache: HashMap<Box<[CellIndex]>, Box<[CellIndex]>>,
}

impl CellExclusions {
    /// Builds the graph from exclusion groups. Every pair of distinct cells
    /// within one group is mutually exclusive.
    pub fn build<'a, I>(num_cells: usize, groups: I) -> Self
    where
        I: IntoIterator<Item = &'a [CellIndex]>,
    {
        let mut sets: Vec<BitSet> = vec![BitSet::with_capacity(num_cells); num_cells];
        for group in groups {
            for &c in group {
                for &other in group {
                    if other != c {
                        sets[c].insert(other);
                    }
                }
            }
        }
        // BitSet iteration is ascending, so the arrays come out sorted.
        let by_cell = sets
            .into_iter()
            .map(|s| s.iter().collect::<Vec<_>>().into_boxed_slice())
            .collect();
        CellExclusions {
            by_cell,
            pair_cache: HashMap::new(),
            list_cache: HashMap::new(),
        }
    }

    pub fn num_cells(&self) -> usize {
        self.by_cell.len()
    }

    /// Cells that must differ from `cell`, sorted ascending.
    pub fn for_cell(&self, cell: CellIndex) -> &[CellIndex] {
        &self.by_cell[cell]
    }

    pub fn are_mutually_exclusive(&self, a: CellIndex, b: CellIndex) -> bool {
        self.by_cell[a].binary_search(&b).is_ok()
    }

    /// Cells mutually exclusive with both `a` and `b`. Cached on first use.
    pub fn pair(&mut self, a: CellIndex, b: CellIndex) -> &[CellIndex] {
        let key = if a <= b { (a, b) } else { (b, a) };
        if !self.pair_cache.contains_key(&key) {
            let cells = intersect_sorted(&self.by_cell[key.0], &self.by_cell[key.1]);
            self.pair_cache.insert(key, cells);
        }
        &self.pair_cache[&key]
    }

    /// Cells mutually exclusive with every cell of `cells`. Cached on first
    /// use; the key is the sorted tuple.
    pub fn tuple(&mut self, cells: &[CellIndex]) -> &[CellIndex] {
        let mut key = cells.to_vec();
        key.sort_unstable();
        let key = key.into_boxed_slice();
        if !self.list_cache.contains_key(&key) {
            let mut acc: Option<Box<[CellIndex]>> = None;
            for &c in key.iter() {
                acc = Some(match acc {
                    None => self.by_cell[c].clone(),
                    Some(prev) => intersect_sorted(&prev, &self.by_cell[c]),
                });
            }
            self.list_cache
                .insert(key.clone(), acc.unwrap_or_default());
        }
        &self.list_cache[&key]
    }
}

fn intersect_sorted(a: &[CellIndex], b: &[CellIndex]) -> Box<[CellIndex]> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(a[i]);
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out.into_boxed_slice()
}
