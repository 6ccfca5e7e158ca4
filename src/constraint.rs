use std::fmt::Debug;

use crate::accumulator::{HandlerAccumulator, HandlerId};
use crate::core::{CellIndex, CellValue, Shape, ValueSet};
use crate::exclusions::CellExclusions;

/// A constraint over some cells of the grid. Handlers narrow candidate
/// masks; the driver schedules them through the accumulator until fixpoint.
///
/// The contract:
/// - `initialize` runs once against the initial grid. It may narrow masks
///   and register pair/tuple intersections with the exclusion caches.
///   Returning false marks the constraint as unsatisfiable outright.
/// - `enforce_consistency` may clear bits in any cell's mask. Whenever it
///   changes a cell it must enqueue that cell's peers via the accumulator
///   (`add_for_cell`, plus the fixed-cell variants when the change produced
///   a singleton). Returning false signals a domain wipeout.
/// - A handler with `essential() == false` is skipped once every cell on
///   the search path is assigned; essential handlers still run then, which
///   is what makes completed grids actually checked.
pub trait Handler: Debug {
    /// The cells this handler constrains. Order is significant for handlers
    /// that care (e.g. lines).
    fn cells(&self) -> &[CellIndex];

    /// Cells known to be mutually exclusive in value because of this
    /// handler. Defaults to `cells()`; handlers without an all-different
    /// core override this with a subset (possibly empty).
    fn exclusion_cells(&self) -> &[CellIndex] {
        self.cells()
    }

    /// Static priority, summed into the per-cell priority vector that seeds
    /// the backtrack-trigger histogram.
    fn priority(&self) -> u32 {
        0
    }

    fn essential(&self) -> bool {
        true
    }

    /// Some for house-shaped handlers (N cells holding a permutation of
    /// 1..=N). Feeds house-value branching and layout validation.
    fn house_cells(&self) -> Option<&[CellIndex]> {
        None
    }

    fn initialize(
        &mut self,
        _grid: &mut [ValueSet],
        _exclusions: &mut CellExclusions,
        _shape: &Shape,
    ) -> bool {
        true
    }

    fn enforce_consistency(&mut self, grid: &mut [ValueSet], acc: &mut HandlerAccumulator)
        -> bool;
}

/// Permutation constraint over N cells: every value 1..=N appears exactly
/// once. Pairwise distinctness is delegated to the exclusion enforcers;
/// this handler adds the positive direction (every value must still have a
/// home, and a value with exactly one home gets fixed there).
#[derive(Debug)]
pub struct HouseHandler {
    cells: Box<[CellIndex]>,
    all_values: ValueSet,
}

impl HouseHandler {
    pub fn new(cells: Vec<CellIndex>, shape: &Shape) -> Self {
        assert_eq!(
            cells.len(),
            shape.num_values(),
            "A house must cover exactly one cell per value"
        );
        HouseHandler {
            cells: cells.into_boxed_slice(),
            all_values: shape.all_values(),
        }
    }
}

impl Handler for HouseHandler {
    fn cells(&self) -> &[CellIndex] {
        &self.cells
    }

    fn priority(&self) -> u32 {
        1
    }

    fn house_cells(&self) -> Option<&[CellIndex]> {
        Some(&self.cells)
    }

    fn enforce_consistency(&mut self, grid: &mut [ValueSet], acc: &mut HandlerAccumulator)
        -> bool {
        let mut at_least_once = ValueSet::EMPTY;
        let mut more_than_once = ValueSet::EMPTY;
        for &c in self.cells.iter() {
            let mask = grid[c];
            more_than_once |= at_least_once & mask;
            at_least_once |= mask;
        }
        if at_least_once != self.all_values {
            return false;
        }
        let exactly_once = at_least_once.without(more_than_once);
        if exactly_once.is_empty() {
            return true;
        }
        for &c in self.cells.iter() {
            let mask = grid[c];
            let hit = mask & exactly_once;
            if hit.is_empty() || (mask == hit && hit.is_singleton()) {
                continue;
            }
            if !hit.is_singleton() {
                // Two values whose only home is this cell.
                return false;
            }
            grid[c] = hit;
            acc.add_for_fixed_cell(c);
            acc.add_aux_for_cell(c);
            acc.add_for_cell(c);
        }
        true
    }
}

/// The given digits of a puzzle, applied by narrowing the initial grid.
#[derive(Debug)]
pub struct GivenDigits {
    cells: Box<[CellIndex]>,
    values: Box<[CellValue]>,
}

impl GivenDigits {
    pub fn new(assignments: &[(CellIndex, CellValue)]) -> Self {
        GivenDigits {
            cells: assignments.iter().map(|&(c, _)| c).collect(),
            values: assignments.iter().map(|&(_, v)| v).collect(),
        }
    }
}

impl Handler for GivenDigits {
    fn cells(&self) -> &[CellIndex] {
        &self.cells
    }

    fn exclusion_cells(&self) -> &[CellIndex] {
        &[]
    }

    fn essential(&self) -> bool {
        false
    }

    fn initialize(
        &mut self,
        grid: &mut [ValueSet],
        _exclusions: &mut CellExclusions,
        _shape: &Shape,
    ) -> bool {
        for (&c, &v) in self.cells.iter().zip(self.values.iter()) {
            let mask = grid[c] & ValueSet::from_value(v);
            if mask.is_empty() {
                return false;
            }
            grid[c] = mask;
        }
        true
    }

    fn enforce_consistency(&mut self, grid: &mut [ValueSet], acc: &mut HandlerAccumulator)
        -> bool {
        for (&c, &v) in self.cells.iter().zip(self.values.iter()) {
            let mask = grid[c] & ValueSet::from_value(v);
            if mask.is_empty() {
                return false;
            }
            if mask != grid[c] {
                grid[c] = mask;
                acc.add_for_cell(c);
            }
        }
        true
    }
}

/// The N-way not-equal over the cells mutually exclusive with one cell.
/// One of these is synthesized per cell during finalization; the driver
/// pushes it to the head of the queue whenever its cell becomes fixed.
#[derive(Debug)]
struct ExclusionEnforcer {
    cell: [CellIndex; 1],
    peers: Box<[CellIndex]>,
}

impl Handler for ExclusionEnforcer {
    fn cells(&self) -> &[CellIndex] {
        &self.cell
    }

    // The exclusion graph already contains these edges; contributing them
    // again would be circular.
    fn exclusion_cells(&self) -> &[CellIndex] {
        &[]
    }

    fn enforce_consistency(&mut self, grid: &mut [ValueSet], acc: &mut HandlerAccumulator)
        -> bool {
        let mask = grid[self.cell[0]];
        if !mask.is_singleton() {
            return true;
        }
        for &p in self.peers.iter() {
            let pm = grid[p];
            if !pm.intersects(mask) {
                continue;
            }
            let narrowed = pm.without(mask);
            if narrowed.is_empty() {
                return false;
            }
            grid[p] = narrowed;
            if narrowed.is_singleton() {
                acc.add_for_fixed_cell(p);
                acc.add_aux_for_cell(p);
            }
            acc.add_for_cell(p);
        }
        true
    }
}

#[derive(Debug, Clone)]
struct PriorityOverride {
    cells: Box<[CellIndex]>,
    priority: u32,
}

/// Builder for the handler collection of one puzzle.
#[derive(Debug, Default)]
pub struct HandlerSet {
    handlers: Vec<Box<dyn Handler>>,
    aux: Vec<bool>,
    overrides: Vec<PriorityOverride>,
}

impl HandlerSet {
    pub fn new() -> Self {
        HandlerSet::default()
    }

    /// Registers an ordinary handler, scheduled whenever one of its cells
    /// changes.
    pub fn add<H: Handler + 'static>(&mut self, handler: H) -> HandlerId {
        self.handlers.push(Box::new(handler));
        self.aux.push(false);
        self.handlers.len() - 1
    }

    /// Registers an auxiliary handler, scheduled only when one of its cells
    /// becomes fixed while the grid is incomplete.
    pub fn add_aux<H: Handler + 'static>(&mut self, handler: H) -> HandlerId {
        self.handlers.push(Box::new(handler));
        self.aux.push(true);
        self.handlers.len() - 1
    }

    /// Overwrites the seeded search priority on the given cells. Overrides
    /// apply in registration order, last one wins.
    pub fn add_priority(&mut self, cells: Vec<CellIndex>, priority: u32) {
        self.overrides.push(PriorityOverride {
            cells: cells.into_boxed_slice(),
            priority,
        });
    }

    /// Derives the exclusion graph, synthesizes the per-cell exclusion
    /// enforcers, and computes the per-cell scheduling tables and static
    /// priorities.
    pub fn finalize(mut self, shape: &Shape) -> FinalizedHandlers {
        let num_cells = shape.num_cells();
        let exclusions =
            CellExclusions::build(num_cells, self.handlers.iter().map(|h| h.exclusion_cells()));

        let mut cell_priorities = vec![0u32; num_cells];
        for h in self.handlers.iter() {
            for &c in h.cells() {
                cell_priorities[c] += h.priority();
            }
        }
        for ov in self.overrides.iter() {
            for &c in ov.cells.iter() {
                cell_priorities[c] = ov.priority;
            }
        }

        let mut ordinary_by_cell: Vec<Vec<HandlerId>> = vec![Vec::new(); num_cells];
        let mut aux_by_cell: Vec<Vec<HandlerId>> = vec![Vec::new(); num_cells];
        for (id, h) in self.handlers.iter().enumerate() {
            let table = if self.aux[id] {
                &mut aux_by_cell
            } else {
                &mut ordinary_by_cell
            };
            for &c in h.cells() {
                table[c].push(id);
            }
        }

        let houses = self
            .handlers
            .iter()
            .filter_map(|h| h.house_cells().map(|cs| cs.to_vec().into_boxed_slice()))
            .collect();

        let mut exclusion_by_cell = Vec::with_capacity(num_cells);
        for cell in 0..num_cells {
            exclusion_by_cell.push(self.handlers.len());
            self.handlers.push(Box::new(ExclusionEnforcer {
                cell: [cell],
                peers: exclusions.for_cell(cell).to_vec().into_boxed_slice(),
            }));
        }

        FinalizedHandlers {
            handlers: self.handlers,
            ordinary_by_cell: ordinary_by_cell
                .into_iter()
                .map(Vec::into_boxed_slice)
                .collect(),
            aux_by_cell: aux_by_cell.into_iter().map(Vec::into_boxed_slice).collect(),
            exclusion_by_cell,
            cell_priorities,
            houses,
            exclusions,
        }
    }
}

/// The finalized handler collection: the handlers array the accumulator
/// indexes into, the derived scheduling tables, and the exclusion graph.
#[derive(Debug)]
pub struct FinalizedHandlers {
    handlers: Vec<Box<dyn Handler>>,
    ordinary_by_cell: Vec<Box<[HandlerId]>>,
    aux_by_cell: Vec<Box<[HandlerId]>>,
    exclusion_by_cell: Vec<HandlerId>,
    cell_priorities: Vec<u32>,
    houses: Vec<Box<[CellIndex]>>,
    exclusions: CellExclusions,
}

impl FinalizedHandlers {
    pub fn num_handlers(&self) -> usize {
        self.handlers.len()
    }

    pub fn handler_mut(&mut self, id: HandlerId) -> &mut dyn Handler {
        self.handlers[id].as_mut()
    }

    pub fn essential(&self, id: HandlerId) -> bool {
        self.handlers[id].essential()
    }

    pub fn cell_priorities(&self) -> &[u32] {
        &self.cell_priorities
    }

    pub fn houses(&self) -> &[Box<[CellIndex]>] {
        &self.houses
    }

    pub fn exclusions(&self) -> &CellExclusions {
        &self.exclusions
    }

    pub fn make_accumulator(&self) -> HandlerAccumulator {
        HandlerAccumulator::new(
            self.handlers.len(),
            self.ordinary_by_cell.clone(),
            self.aux_by_cell.clone(),
            self.exclusion_by_cell.clone(),
        )
    }

    /// Runs every handler's one-shot initialization against the initial
    /// grid. A handler that reports unsatisfiability has its cells
    /// invalidated (the whole grid, if it has no cells); the search then
    /// finds zero solutions without special-casing.
    pub fn initialize_grid(&mut self, grid: &mut [ValueSet], shape: &Shape) {
        for i in 0..self.handlers.len() {
            if self.handlers[i].initialize(grid, &mut self.exclusions, shape) {
                continue;
            }
            let cells = self.handlers[i].cells();
            if cells.is_empty() {
                grid.fill(ValueSet::EMPTY);
            } else {
                for &c in cells {
                    grid[c] = ValueSet::EMPTY;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn shape4() -> Shape {
        Shape::new(4).unwrap()
    }

    fn house4(cells: Vec<CellIndex>) -> HouseHandler {
        HouseHandler::new(cells, &shape4())
    }

    fn full_grid(shape: &Shape) -> Vec<ValueSet> {
        vec![shape.all_values(); shape.num_cells()]
    }

    #[test]
    fn test_house_hidden_single() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        // Value 4 only fits in cell 2.
        grid[0] = ValueSet::from_bits(0b0111);
        grid[1] = ValueSet::from_bits(0b0111);
        grid[3] = ValueSet::from_bits(0b0111);
        let mut acc = fh.make_accumulator();
        assert!(fh.handler_mut(0).enforce_consistency(&mut grid, &mut acc));
        assert_eq!(grid[2], ValueSet::from_value(4));
        // The fix must have scheduled the exclusion enforcer first.
        assert!(!acc.is_empty());
    }

    #[test]
    fn test_house_missing_value_is_contradiction() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        for c in 0..4 {
            grid[c] = ValueSet::from_bits(0b0111);
        }
        let mut acc = fh.make_accumulator();
        assert!(!fh.handler_mut(0).enforce_consistency(&mut grid, &mut acc));
    }

    #[test]
    fn test_house_two_values_one_home_is_contradiction() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        // Values 3 and 4 both only fit in cell 0.
        grid[1] = ValueSet::from_bits(0b0011);
        grid[2] = ValueSet::from_bits(0b0011);
        grid[3] = ValueSet::from_bits(0b0011);
        let mut acc = fh.make_accumulator();
        assert!(!fh.handler_mut(0).enforce_consistency(&mut grid, &mut acc));
    }

    #[test]
    fn test_house_two_exclusive_values_in_narrowed_cell_is_contradiction() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        // Values 3 and 4 fit only in cell 0, whose mask is already exactly
        // {3,4}: still a contradiction, one cell cannot hold both.
        grid[0] = ValueSet::from_bits(0b1100);
        grid[1] = ValueSet::from_bits(0b0011);
        grid[2] = ValueSet::from_bits(0b0011);
        grid[3] = ValueSet::from_bits(0b0011);
        let mut acc = fh.make_accumulator();
        assert!(!fh.handler_mut(0).enforce_consistency(&mut grid, &mut acc));
    }

    #[test]
    fn test_house_fixed_exclusive_value_is_not_a_contradiction() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        // Cell 0 fixed to 4, the others restricted to {1,2,3}: value 4's
        // only home is the cell already holding it.
        grid[0] = ValueSet::from_value(4);
        grid[1] = ValueSet::from_bits(0b0111);
        grid[2] = ValueSet::from_bits(0b0111);
        grid[3] = ValueSet::from_bits(0b0111);
        let mut acc = fh.make_accumulator();
        assert!(fh.handler_mut(0).enforce_consistency(&mut grid, &mut acc));
        assert_eq!(grid[0], ValueSet::from_value(4));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_enforcer_eliminates_and_chains() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        grid[0] = ValueSet::from_value(1);
        grid[1] = ValueSet::from_bits(0b0011); // {1,2}: becomes fixed to 2
        let mut acc = fh.make_accumulator();
        acc.add_for_fixed_cell(0);
        let id = acc.take_next().unwrap();
        assert!(fh.handler_mut(id).enforce_consistency(&mut grid, &mut acc));
        assert_eq!(grid[1], ValueSet::from_value(2));
        assert!(!grid[2].contains(1));
        assert!(!grid[3].contains(1));
        // Cell 1 became fixed, so its enforcer is now at the queue head.
        let next = acc.take_next().unwrap();
        assert!(fh.handler_mut(next).enforce_consistency(&mut grid, &mut acc));
        assert!(!grid[2].contains(2));
    }

    #[test]
    fn test_enforcer_wipeout() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        grid[0] = ValueSet::from_value(1);
        grid[1] = ValueSet::from_value(1);
        let mut acc = fh.make_accumulator();
        acc.add_for_fixed_cell(0);
        let id = acc.take_next().unwrap();
        assert!(!fh.handler_mut(id).enforce_consistency(&mut grid, &mut acc));
    }

    #[test]
    fn test_givens_narrow_initial_grid() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        set.add(GivenDigits::new(&[(0, 3), (2, 1)]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        fh.initialize_grid(&mut grid, &shape);
        assert_eq!(grid[0], ValueSet::from_value(3));
        assert_eq!(grid[2], ValueSet::from_value(1));
        assert_eq!(grid[1], shape.all_values());
    }

    #[test]
    fn test_unsatisfiable_given_invalidates_cells() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        // Two givens fighting over cell 0.
        set.add(GivenDigits::new(&[(0, 1), (0, 2)]));
        let mut fh = set.finalize(&shape);
        let mut grid = full_grid(&shape);
        fh.initialize_grid(&mut grid, &shape);
        assert_eq!(grid[0], ValueSet::EMPTY);
    }

    #[test]
    fn test_finalize_tables() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        let h0 = set.add(house4(vec![0, 1, 2, 3]));
        let h1 = set.add(house4(vec![0, 4, 8, 12]));
        let fh = set.finalize(&shape);
        // 2 houses + 16 enforcers.
        assert_eq!(fh.num_handlers(), 18);
        assert_eq!(fh.houses().len(), 2);
        assert_eq!(fh.exclusions().for_cell(0), &[1, 2, 3, 4, 8, 12]);
        let mut acc = fh.make_accumulator();
        acc.add_for_cell(0);
        assert_eq!(acc.take_next(), Some(h0));
        assert_eq!(acc.take_next(), Some(h1));
        assert_eq!(acc.take_next(), None);
    }

    #[test]
    fn test_priority_seeding_and_overrides() {
        let shape = shape4();
        let mut set = HandlerSet::new();
        set.add(house4(vec![0, 1, 2, 3]));
        set.add(house4(vec![0, 4, 8, 12]));
        set.add_priority(vec![0, 1], 7);
        set.add_priority(vec![1], 2);
        let fh = set.finalize(&shape);
        let p = fh.cell_priorities();
        // Cell 0: overridden. Cell 1: second override wins. Cell 2: summed.
        assert_eq!(p[0], 7);
        assert_eq!(p[1], 2);
        assert_eq!(p[2], 1);
        assert_eq!(p[4], 1);
        assert_eq!(p[5], 0);
    }
}
