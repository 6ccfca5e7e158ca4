use crate::accumulator::HandlerAccumulator;
use crate::constraint::FinalizedHandlers;
use crate::core::{CellIndex, Error, Shape, ValueSet};
use crate::debug::{DebugLog, DebugRecord, Loc};
use crate::grid::GridStack;
use crate::selector::{CandidateSelector, StepGuide, StepGuides};

pub const STALE_RUN_ERROR: Error = Error::new_const("Iterator no longer valid");

/// How many driver iterations between right-shifts of the backtrack-trigger
/// histogram.
const BT_DECAY_MASK: u64 = (1 << 14) - 1;

/// Monotonic search statistics, readable at any time (including after a
/// failed run). `progress_ratio` and `branches_ignored` are fractions of
/// the search space; together with what remains on the stack they account
/// for 1.0 within rounding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counters {
    pub values_tried: u64,
    pub nodes_searched: u64,
    pub backtracks: u64,
    pub guesses: u64,
    pub solutions: u64,
    pub constraints_processed: u64,
    pub progress_ratio: f64,
    pub branches_ignored: f64,
}

/// What a run yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMode {
    /// Solutions only.
    OnSolution,
    /// Every propagation step (and every contradiction), plus solutions.
    OnStep,
    /// Every k-th contradiction, plus solutions.
    OnContradiction(u64),
}

/// One yielded event. Solutions have every cell fixed; contradiction
/// samples carry the grid state at the point propagation failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverEvent {
    pub grid: Vec<ValueSet>,
    pub old_grid: Option<Vec<ValueSet>>,
    /// The assigned prefix of the search order, latest cell last.
    pub cell_order: Vec<CellIndex>,
    /// The branched cell's candidates before this step's assignment.
    pub values: ValueSet,
    pub latest_cell: Option<CellIndex>,
    pub is_solution: bool,
    pub has_contradiction: bool,
}

/// Token for one run of the solver. A `reset` or a newer `start_run`
/// invalidates it; advancing a stale token is a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    counter: u64,
    mode: YieldMode,
}

impl Run {
    pub fn mode(&self) -> YieldMode {
        self.mode
    }
}

pub type ProgressCallback = Box<dyn FnMut(&Counters, Option<&[ValueSet]>)>;

struct StepState {
    step: u64,
    old_grid: Vec<ValueSet>,
    initial_yielded: bool,
}

/// The search driver: an explicit-stack depth-first search over grid-stack
/// frames, producing a lazy stream of events.
///
/// The stack holds one entry per open node. Forced branches reuse their
/// parent's frame; guesses copy the frame, remove the tried value from the
/// parent copy, and leave the parent on the stack to be revisited with the
/// remaining candidates.
pub struct Solver {
    shape: Shape,
    handlers: FinalizedHandlers,
    grids: GridStack,
    acc: HandlerAccumulator,
    selector: CandidateSelector,
    // Backtrack-trigger histogram: seeded from static cell priorities,
    // bumped at the branching cell on contradiction, decayed periodically.
    bt: Vec<u32>,
    rec_stack: Vec<usize>,
    remaining: Vec<f64>,
    new_node: Vec<bool>,
    stack_len: usize,
    last_contradiction_cell: Vec<i32>,
    counters: Counters,
    iteration_counter: u64,
    run_counter: u64,
    done: bool,
    step_state: Option<StepState>,
    step_guides: Option<StepGuides>,
    uninteresting: Option<Vec<ValueSet>>,
    frequency_mask: u64,
    progress_callback: Option<ProgressCallback>,
    last_solution: Option<Vec<ValueSet>>,
    debug: DebugLog,
    contradiction_loc: Loc,
    solution_loc: Loc,
}

impl Solver {
    pub fn new(shape: Shape, handlers: FinalizedHandlers) -> Self {
        let num_cells = shape.num_cells();
        let houses = handlers.houses().to_vec();
        let mut solver = Solver {
            grids: GridStack::new(num_cells, num_cells + 1),
            acc: handlers.make_accumulator(),
            selector: CandidateSelector::new(num_cells, shape.num_values(), houses),
            bt: vec![0; num_cells],
            rec_stack: vec![0; num_cells + 2],
            remaining: vec![0.0; num_cells + 2],
            new_node: vec![false; num_cells + 2],
            stack_len: 0,
            last_contradiction_cell: vec![-1; num_cells + 1],
            counters: Counters::default(),
            iteration_counter: 0,
            run_counter: 0,
            done: false,
            step_state: None,
            step_guides: None,
            uninteresting: None,
            frequency_mask: (1 << 12) - 1,
            progress_callback: None,
            last_solution: None,
            debug: DebugLog::disabled(),
            contradiction_loc: Loc::register("solver.contradiction"),
            solution_loc: Loc::register("solver.solution"),
            shape,
            handlers,
        };
        solver.reset();
        solver
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn houses(&self) -> &[Box<[CellIndex]>] {
        self.handlers.houses()
    }

    /// The last solution seen, for progress reporting.
    pub fn last_solution(&self) -> Option<&[ValueSet]> {
        self.last_solution.as_deref()
    }

    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>, frequency_mask: u64) {
        self.progress_callback = callback;
        self.frequency_mask = frequency_mask;
    }

    pub fn set_step_guides(&mut self, guides: Option<StepGuides>) {
        self.step_guides = guides;
    }

    /// Arms interesting-branch pruning: branches that cannot produce a value
    /// outside these per-cell masks are dropped and charged to
    /// `branches_ignored`.
    pub fn set_uninteresting_values(&mut self, masks: Vec<ValueSet>) {
        self.uninteresting = Some(masks);
    }

    pub fn debug_mut(&mut self) -> &mut DebugLog {
        &mut self.debug
    }

    pub fn replace_debug(&mut self, debug: DebugLog) {
        self.debug = debug;
    }

    pub fn dump_backtrack_triggers(&mut self) {
        self.debug.dump_backtrack_triggers(&self.bt);
    }

    pub fn reset(&mut self) {
        self.reset_with_givens(&[]);
    }

    /// Rebuilds the initial grid: full masks, each handler's `initialize`
    /// pass, the extra given masks, then propagation to fixpoint. Poisons
    /// any outstanding run.
    pub fn reset_with_givens(&mut self, givens: &[(CellIndex, ValueSet)]) {
        self.run_counter += 1;
        self.counters = Counters::default();
        self.iteration_counter = 0;
        self.done = false;
        self.selector.reset();
        self.bt.copy_from_slice(self.handlers.cell_priorities());
        self.last_contradiction_cell.fill(-1);
        self.acc.clear();
        self.acc.set_aux_enabled(true);
        self.uninteresting = None;
        self.last_solution = None;
        self.step_state = None;

        let num_cells = self.shape.num_cells();
        let grid = self.grids.frame_mut(0);
        grid.fill(self.shape.all_values());
        self.handlers.initialize_grid(grid, &self.shape);
        for &(c, mask) in givens {
            grid[c] &= mask;
        }
        for c in 0..num_cells {
            if grid[c].is_singleton() {
                self.acc.add_for_fixed_cell(c);
                self.acc.add_aux_for_cell(c);
            }
            self.acc.add_for_cell(c);
        }
        if self.enforce_constraints(0, false) {
            self.rec_stack[0] = 0;
            self.remaining[0] = 1.0;
            self.new_node[0] = true;
            self.stack_len = 1;
        } else {
            // Unsatisfiable before any branching: the whole space is
            // accounted for and the search yields nothing.
            self.counters.progress_ratio = 1.0;
            self.stack_len = 0;
        }
    }

    /// Starts (or continues) a run in the given yield mode, invalidating
    /// previous run tokens.
    pub fn start_run(&mut self, mode: YieldMode) -> Run {
        self.run_counter += 1;
        if mode == YieldMode::OnStep {
            let top = if self.stack_len > 0 { self.stack_len - 1 } else { 0 };
            self.step_state = Some(StepState {
                step: 0,
                old_grid: self.grids.frame(top).to_vec(),
                initial_yielded: false,
            });
        }
        Run {
            counter: self.run_counter,
            mode,
        }
    }

    /// Advances the search to the next event of the run, or None when the
    /// space is exhausted.
    pub fn next_event(&mut self, run: &Run) -> Result<Option<SolverEvent>, Error> {
        if run.counter != self.run_counter {
            return Err(STALE_RUN_ERROR);
        }
        let num_cells = self.shape.num_cells();

        if run.mode == YieldMode::OnStep {
            if let Some(state) = &mut self.step_state {
                if !state.initial_yielded {
                    state.initial_yielded = true;
                    state.step = 1;
                    let top = if self.stack_len > 0 { self.stack_len - 1 } else { 0 };
                    let grid = self.grids.frame(top).to_vec();
                    let wiped = grid.iter().any(|m| m.is_empty());
                    state.old_grid.copy_from_slice(&grid);
                    return Ok(Some(SolverEvent {
                        old_grid: Some(grid.clone()),
                        grid,
                        cell_order: Vec::new(),
                        values: ValueSet::EMPTY,
                        latest_cell: None,
                        is_solution: false,
                        has_contradiction: wiped,
                    }));
                }
            }
        }

        loop {
            if self.stack_len == 0 {
                self.done = true;
                return Ok(None);
            }
            self.stack_len -= 1;
            let d = self.stack_len;
            let cell_depth = self.rec_stack[d];
            let is_new = self.new_node[d];
            self.new_node[d] = false;

            if is_new {
                self.counters.nodes_searched += 1;
                if cell_depth == num_cells {
                    return Ok(Some(self.yield_solution(run, d)));
                }
            }

            let guide = self.current_guide(run);
            let sel = self.selector.select_next_candidate(
                cell_depth,
                self.grids.frame(d),
                &self.bt,
                guide,
                is_new,
            );
            if sel.count == 0 {
                // Dead node (exhausted, or holding an invalidated cell):
                // whatever share it still carried is accounted as searched.
                self.counters.progress_ratio += self.remaining[d];
                self.remaining[d] = 0.0;
                continue;
            }

            let progress_delta = self.remaining[d] / sel.count as f64;
            self.remaining[d] -= progress_delta;
            self.counters.values_tried += sel.cell_count as u64;
            self.iteration_counter += 1;
            if self.iteration_counter & BT_DECAY_MASK == 0 {
                for b in self.bt.iter_mut() {
                    *b >>= 1;
                }
            }

            let branched = self.selector.cell_at(cell_depth);
            let old_values = self.grids.frame(d)[branched];

            // A guess leaves this node on the stack with the tried value
            // removed, and descends into a copied frame.
            let wd = if sel.count > 1 {
                self.counters.guesses += 1;
                self.grids.frame_mut(d)[branched] = old_values.without(sel.value);
                self.grids.push_copy(d);
                self.stack_len = d + 1;
                d + 1
            } else {
                d
            };

            let new_cell_depth = cell_depth + sel.cell_count;
            let grid_complete = new_cell_depth == num_cells;

            self.grids.frame_mut(wd)[branched] = sel.value;
            self.acc.set_aux_enabled(!grid_complete);
            for i in 0..sel.cell_count {
                let c = self.selector.cell_at(cell_depth + i);
                self.acc.add_for_fixed_cell(c);
                self.acc.add_aux_for_cell(c);
                self.acc.add_for_cell(c);
            }
            // The cell that contradicted the previous sibling is likely to
            // contradict this one; run its handlers early.
            let lcc = self.last_contradiction_cell[cell_depth];
            if lcc >= 0 {
                self.acc.add_for_cell(lcc as usize);
            }
            if sel.count == 1 {
                self.last_contradiction_cell[cell_depth] = -1;
            }

            if !self.enforce_constraints(wd, grid_complete) {
                self.last_contradiction_cell[new_cell_depth - 1] = branched as i32;
                self.counters.backtracks += 1;
                self.bt[branched] += 1;
                self.counters.progress_ratio += progress_delta;
                if self.debug.enabled() {
                    let loc = self.contradiction_loc;
                    let id = self.shape.cell_id(branched);
                    self.debug.log(|| DebugRecord {
                        loc,
                        msg: format!("contradiction after {} <- {}", id, sel.value),
                        cells: vec![branched],
                    });
                }
                if self.should_yield_contradiction(run) {
                    return Ok(Some(self.yield_contradiction(run, wd, new_cell_depth, branched, old_values)));
                }
                continue;
            }

            if self.iteration_counter & self.frequency_mask == 0 {
                if let Some(cb) = &mut self.progress_callback {
                    cb(&self.counters, self.last_solution.as_deref());
                }
            }

            if let Some(uninteresting) = &self.uninteresting {
                let grid = self.grids.frame(wd);
                let novel = grid
                    .iter()
                    .zip(uninteresting.iter())
                    .any(|(g, u)| !g.without(*u).is_empty());
                if !novel {
                    self.counters.branches_ignored += progress_delta;
                    continue;
                }
            }

            self.rec_stack[wd] = new_cell_depth;
            self.remaining[wd] = progress_delta;
            self.new_node[wd] = true;
            self.stack_len = wd + 1;

            if run.mode == YieldMode::OnStep {
                return Ok(Some(self.yield_step(wd, new_cell_depth, branched, old_values)));
            }
        }
    }

    fn current_guide(&self, run: &Run) -> Option<StepGuide> {
        if run.mode != YieldMode::OnStep {
            return None;
        }
        let state = self.step_state.as_ref()?;
        self.step_guides.as_ref()?.get(&state.step).copied()
    }

    fn should_yield_contradiction(&self, run: &Run) -> bool {
        match run.mode {
            YieldMode::OnSolution => false,
            YieldMode::OnStep => true,
            YieldMode::OnContradiction(k) => k > 0 && self.counters.backtracks % k == 0,
        }
    }

    fn yield_solution(&mut self, run: &Run, d: usize) -> SolverEvent {
        self.counters.solutions += 1;
        self.counters.progress_ratio += self.remaining[d];
        self.remaining[d] = 0.0;
        let grid = self.grids.frame(d).to_vec();
        self.last_solution = Some(grid.clone());
        if self.debug.enabled() {
            let loc = self.solution_loc;
            let n = self.counters.solutions;
            self.debug.log(|| DebugRecord {
                loc,
                msg: format!("solution #{}", n),
                cells: vec![],
            });
        }
        let num_cells = self.shape.num_cells();
        let old_grid = self.step_event_old_grid(run, &grid);
        SolverEvent {
            grid,
            old_grid,
            cell_order: self.selector.cell_order()[..num_cells].to_vec(),
            values: ValueSet::EMPTY,
            latest_cell: Some(self.selector.cell_at(num_cells - 1)),
            is_solution: true,
            has_contradiction: false,
        }
    }

    fn yield_contradiction(
        &mut self,
        run: &Run,
        wd: usize,
        new_cell_depth: usize,
        branched: CellIndex,
        old_values: ValueSet,
    ) -> SolverEvent {
        let grid = self.grids.frame(wd).to_vec();
        let old_grid = self.step_event_old_grid(run, &grid);
        SolverEvent {
            grid,
            old_grid,
            cell_order: self.selector.cell_order()[..new_cell_depth].to_vec(),
            values: old_values,
            latest_cell: Some(branched),
            is_solution: false,
            has_contradiction: true,
        }
    }

    fn yield_step(
        &mut self,
        wd: usize,
        new_cell_depth: usize,
        branched: CellIndex,
        old_values: ValueSet,
    ) -> SolverEvent {
        let grid = self.grids.frame(wd).to_vec();
        let old_grid = self.step_state.as_ref().map(|s| s.old_grid.clone());
        if let Some(state) = &mut self.step_state {
            state.old_grid.copy_from_slice(&grid);
            state.step += 1;
        }
        SolverEvent {
            grid,
            old_grid,
            cell_order: self.selector.cell_order()[..new_cell_depth].to_vec(),
            values: old_values,
            latest_cell: Some(branched),
            is_solution: false,
            has_contradiction: false,
        }
    }

    // Step-mode events diff against the previous yield; other modes don't
    // carry an old grid.
    fn step_event_old_grid(&mut self, run: &Run, grid: &[ValueSet]) -> Option<Vec<ValueSet>> {
        if run.mode != YieldMode::OnStep {
            return None;
        }
        let state = self.step_state.as_mut()?;
        let old = state.old_grid.clone();
        state.old_grid.copy_from_slice(grid);
        state.step += 1;
        Some(old)
    }

    /// Drains the accumulator to fixpoint. Returns false on the first
    /// handler that reports a wipeout; the queue is cleared so the next
    /// branch starts clean.
    fn enforce_constraints(&mut self, depth: usize, grid_complete: bool) -> bool {
        let grid = self.grids.frame_mut(depth);
        while let Some(h) = self.acc.take_next() {
            if grid_complete && !self.handlers.essential(h) {
                continue;
            }
            self.counters.constraints_processed += 1;
            if !self
                .handlers
                .handler_mut(h)
                .enforce_consistency(grid, &mut self.acc)
            {
                self.acc.clear();
                return false;
            }
        }
        true
    }

    /// The unconsumed share of the search space still sitting on the stack.
    /// `progress_ratio + branches_ignored + stack_remaining` accounts for
    /// 1.0 within rounding.
    pub fn stack_remaining(&self) -> f64 {
        self.remaining[..self.stack_len].iter().sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constraint::Handler;
    use crate::sudoku::{standard_handler_set, standard_puzzle, solution_values};

    fn solver4(givens: &str) -> Solver {
        let shape = Shape::new(4).unwrap();
        let set = standard_puzzle(&shape, givens).unwrap();
        Solver::new(shape.clone(), set.finalize(&shape))
    }

    fn empty_solver4() -> Solver {
        let shape = Shape::new(4).unwrap();
        let set = standard_handler_set(&shape);
        Solver::new(shape.clone(), set.finalize(&shape))
    }

    fn drain(solver: &mut Solver, run: &Run) -> Vec<SolverEvent> {
        let mut events = Vec::new();
        while let Some(ev) = solver.next_event(run).unwrap() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn test_empty_4x4_has_288_solutions() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        let events = drain(&mut solver, &run);
        assert_eq!(events.len(), 288);
        assert!(events.iter().all(|e| e.is_solution));
        assert_eq!(solver.counters().solutions, 288);
        assert!(solver.is_done());
    }

    #[test]
    fn test_solutions_are_sound() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        for ev in drain(&mut solver, &run) {
            let values = solution_values(&ev.grid).expect("every cell fixed");
            crate::sudoku::test_util::assert_valid_classic_solution(
                &Shape::new(4).unwrap(),
                "................",
                &values,
            );
        }
    }

    #[test]
    fn test_unique_puzzle() {
        // 1234/3412/2143/4321 with enough givens to pin it down.
        let mut solver = solver4("1234341221434..1");
        let run = solver.start_run(YieldMode::OnSolution);
        let events = drain(&mut solver, &run);
        assert_eq!(events.len(), 1);
        assert_eq!(
            solution_values(&events[0].grid).unwrap(),
            vec![1, 2, 3, 4, 3, 4, 1, 2, 2, 1, 4, 3, 4, 3, 2, 1],
        );
    }

    #[test]
    fn test_unsatisfiable_givens_yield_nothing() {
        // Two 1s in the first row.
        let mut solver = solver4("11..............");
        let run = solver.start_run(YieldMode::OnSolution);
        assert_eq!(solver.next_event(&run).unwrap(), None);
        assert_eq!(solver.counters().solutions, 0);
        assert!((solver.counters().progress_ratio - 1.0).abs() < 1e-9);
    }

    // Reports unsatisfiability from initialize; its enforcement pass is a
    // no-op, so the contradiction survives only as the invalidated mask.
    #[derive(Debug)]
    struct FailsInit {
        cells: Vec<CellIndex>,
    }
    impl Handler for FailsInit {
        fn cells(&self) -> &[CellIndex] {
            &self.cells
        }
        fn exclusion_cells(&self) -> &[CellIndex] {
            &[]
        }
        fn initialize(
            &mut self,
            _grid: &mut [ValueSet],
            _exclusions: &mut crate::exclusions::CellExclusions,
            _shape: &Shape,
        ) -> bool {
            false
        }
        fn enforce_consistency(
            &mut self,
            _grid: &mut [ValueSet],
            _acc: &mut HandlerAccumulator,
        ) -> bool {
            true
        }
    }

    #[test]
    fn test_invalidated_initialization_finds_no_solutions() {
        let shape = Shape::new(4).unwrap();
        let mut set = standard_handler_set(&shape);
        set.add(FailsInit { cells: vec![0] });
        let mut solver = Solver::new(shape.clone(), set.finalize(&shape));
        assert_eq!(solver.grids.frame(0)[0], ValueSet::EMPTY);
        let run = solver.start_run(YieldMode::OnSolution);
        assert_eq!(solver.next_event(&run).unwrap(), None);
        assert_eq!(solver.counters().solutions, 0);
        assert!((solver.counters().progress_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_conservation() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        let _ = drain(&mut solver, &run);
        let total = solver.counters().progress_ratio + solver.counters().branches_ignored;
        assert!((total - 1.0).abs() < 1e-6, "total = {}", total);
    }

    #[test]
    fn test_progress_accounts_for_stack_mid_run() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        for _ in 0..5 {
            assert!(solver.next_event(&run).unwrap().is_some());
            let total = solver.counters().progress_ratio
                + solver.counters().branches_ignored
                + solver.stack_remaining();
            assert!((total - 1.0).abs() < 1e-6, "total = {}", total);
        }
    }

    #[test]
    fn test_determinism() {
        let collect = || {
            let mut solver = empty_solver4();
            let run = solver.start_run(YieldMode::OnSolution);
            let events = drain(&mut solver, &run);
            (events, solver.counters().clone())
        };
        let (e1, c1) = collect();
        let (e2, c2) = collect();
        assert_eq!(e1, e2);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_stale_run_after_reset() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        assert!(solver.next_event(&run).unwrap().is_some());
        solver.reset();
        assert_eq!(solver.next_event(&run), Err(STALE_RUN_ERROR));
    }

    #[test]
    fn test_stale_run_after_new_run() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        let run2 = solver.start_run(YieldMode::OnSolution);
        assert_eq!(solver.next_event(&run), Err(STALE_RUN_ERROR));
        assert!(solver.next_event(&run2).unwrap().is_some());
    }

    #[test]
    fn test_contradiction_yields() {
        // A puzzle with a contradiction-rich search: no givens, yield every
        // contradiction.
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnContradiction(1));
        let events = drain(&mut solver, &run);
        let contradictions = events.iter().filter(|e| e.has_contradiction).count() as u64;
        let solutions = events.iter().filter(|e| e.is_solution).count() as u64;
        assert_eq!(solutions, 288);
        assert_eq!(contradictions, solver.counters().backtracks);
    }

    #[test]
    fn test_propagation_is_idempotent() {
        let mut solver = solver4("1.2....3..4.2...");
        let before = solver.grids.frame(0).to_vec();
        // Re-enqueue everything; a second drain must not change the grid.
        for c in 0..16 {
            if before[c].is_singleton() {
                solver.acc.add_for_fixed_cell(c);
            }
            solver.acc.add_for_cell(c);
        }
        assert!(solver.enforce_constraints(0, false));
        assert_eq!(solver.grids.frame(0), before.as_slice());
    }

    #[test]
    fn test_progress_callback_fires() {
        use std::cell::Cell;
        use std::rc::Rc;
        let fired = Rc::new(Cell::new(0u64));
        let seen = fired.clone();
        let mut solver = empty_solver4();
        solver.set_progress_callback(
            Some(Box::new(move |counters, _| {
                assert!(counters.values_tried > 0);
                seen.set(seen.get() + 1);
            })),
            0, // every successful iteration
        );
        let run = solver.start_run(YieldMode::OnSolution);
        let _ = drain(&mut solver, &run);
        assert!(fired.get() > 0);
    }

    #[test]
    fn test_counters_move_forward() {
        let mut solver = empty_solver4();
        let run = solver.start_run(YieldMode::OnSolution);
        let _ = drain(&mut solver, &run);
        let c = solver.counters();
        assert!(c.nodes_searched > 0);
        assert!(c.guesses > 0);
        // Every pushed node was reached by an iteration that assigned at
        // least one cell.
        assert!(c.values_tried + 1 >= c.nodes_searched);
        assert!(c.constraints_processed > 0);
    }
}
