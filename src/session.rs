use crate::constraint::HandlerSet;
use crate::core::{CellIndex, CellValue, Error, Shape, ValueSet};
use crate::selector::StepGuides;
use crate::solver::{Run, Solver, SolverEvent, YieldMode};
use crate::sudoku::solution_values;

/// Facade knobs. The defaults match interactive use: a handful of kept
/// solutions and a small contradiction budget per layout probe.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cap on solutions kept (not counted) by `solve_all_possibilities`.
    pub max_collected_solutions: usize,
    /// Contradiction budget per house probe in `validate_layout`.
    pub layout_contradiction_budget: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_collected_solutions: 8,
            layout_contradiction_budget: 200,
        }
    }
}

/// One materialized step of a step-mode run, in pencilmark form.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Per-cell candidates after this step.
    pub pencilmarks: Vec<ValueSet>,
    /// Per-cell candidates removed by this step.
    pub diff_pencilmarks: Vec<ValueSet>,
    /// Human id of the cell this step branched on, if any.
    pub latest_cell: Option<String>,
    pub is_solution: bool,
    pub has_contradiction: bool,
    /// The branched cell's candidates before the step.
    pub values: ValueSet,
}

/// The result of `solve_all_possibilities`.
#[derive(Debug, Clone, PartialEq)]
pub struct AllPossibilities {
    /// Per cell, the union of its values over every solution.
    pub pencilmarks: Vec<ValueSet>,
    /// Up to `max_collected_solutions` solved grids.
    pub solutions: Vec<Vec<CellValue>>,
    /// The full solution count (a lower bound once pruning kicked in).
    pub solution_count: u64,
}

enum IterPos {
    Solutions { run: Run, yielded: u64 },
    Steps { run: Run, yielded: u64, with_guides: bool },
}

/// One interactive solving session: owns the solver and reuses in-flight
/// runs when the consumer keeps moving forward.
pub struct Session {
    solver: Solver,
    config: SessionConfig,
    position: Option<IterPos>,
}

impl Session {
    pub fn new(shape: Shape, handlers: HandlerSet) -> Self {
        let finalized = handlers.finalize(&shape);
        Session {
            solver: Solver::new(shape, finalized),
            config: SessionConfig::default(),
            position: None,
        }
    }

    pub fn with_config(shape: Shape, handlers: HandlerSet, config: SessionConfig) -> Self {
        let mut s = Session::new(shape, handlers);
        s.config = config;
        s
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// Exhaustively counts solutions. Progress callbacks during the drain
    /// see the most recent solution as their sample state.
    pub fn count_solutions(&mut self) -> Result<u64, Error> {
        self.position = None;
        self.solver.reset();
        let run = self.solver.start_run(YieldMode::OnSolution);
        while self.solver.next_event(&run)?.is_some() {}
        Ok(self.solver.counters().solutions)
    }

    /// The n-th (0-based) solution, or None if there are fewer. Seeking
    /// forward continues the current enumeration; seeking backward restarts
    /// it.
    pub fn nth_solution(&mut self, n: u64) -> Result<Option<Vec<CellValue>>, Error> {
        let reusable = matches!(
            &self.position,
            Some(IterPos::Solutions { yielded, .. }) if *yielded <= n
        );
        if !reusable {
            self.solver.reset();
            let run = self.solver.start_run(YieldMode::OnSolution);
            self.position = Some(IterPos::Solutions { run, yielded: 0 });
        }
        let (run, yielded) = match &mut self.position {
            Some(IterPos::Solutions { run, yielded }) => (*run, yielded),
            _ => unreachable!(),
        };
        while *yielded <= n {
            match self.solver.next_event(&run)? {
                Some(ev) if ev.is_solution => {
                    *yielded += 1;
                    if *yielded == n + 1 {
                        return Ok(solution_values(&ev.grid));
                    }
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// The n-th (0-based) step of a step-mode run. The run is keyed on the
    /// presence of guides: switching between guided and unguided restarts
    /// it, as does seeking backward.
    pub fn nth_step(
        &mut self,
        n: u64,
        guides: Option<StepGuides>,
    ) -> Result<Option<StepResult>, Error> {
        let with_guides = guides.is_some();
        let reusable = matches!(
            &self.position,
            Some(IterPos::Steps { yielded, with_guides: wg, .. })
                if *wg == with_guides && *yielded <= n
        );
        if !reusable {
            self.solver.set_step_guides(guides);
            self.solver.reset();
            let run = self.solver.start_run(YieldMode::OnStep);
            self.position = Some(IterPos::Steps {
                run,
                yielded: 0,
                with_guides,
            });
        }
        let (run, yielded) = match &mut self.position {
            Some(IterPos::Steps { run, yielded, .. }) => (*run, yielded),
            _ => unreachable!(),
        };
        while *yielded <= n {
            match self.solver.next_event(&run)? {
                Some(ev) => {
                    *yielded += 1;
                    if *yielded == n + 1 {
                        return Ok(Some(step_result(self.solver.shape(), ev)));
                    }
                }
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Enumerates every solution, ORing them into per-cell unions. Once a
    /// second solution is known, branches that cannot produce a novel value
    /// combination are pruned, so the count is a lower bound while the
    /// unions stay exact.
    pub fn solve_all_possibilities(&mut self) -> Result<AllPossibilities, Error> {
        self.position = None;
        self.solver.reset();
        let run = self.solver.start_run(YieldMode::OnSolution);
        let num_cells = self.solver.shape().num_cells();
        let mut union = vec![ValueSet::EMPTY; num_cells];
        let mut solutions = Vec::new();
        while let Some(ev) = self.solver.next_event(&run)? {
            if !ev.is_solution {
                continue;
            }
            for (u, g) in union.iter_mut().zip(ev.grid.iter()) {
                *u |= *g;
            }
            if solutions.len() < self.config.max_collected_solutions {
                if let Some(values) = solution_values(&ev.grid) {
                    solutions.push(values);
                }
            }
            if self.solver.counters().solutions >= 2 {
                self.solver.set_uninteresting_values(union.clone());
            }
        }
        Ok(AllPossibilities {
            pencilmarks: union,
            solutions,
            solution_count: self.solver.counters().solutions,
        })
    }

    /// Is this arrangement of houses satisfiable at all, independent of
    /// givens? Each house is probed by filling it with the identity
    /// permutation and searching under a contradiction budget: a solution
    /// is a definitive yes, an exhausted search a definitive no. If every
    /// probe runs out of budget, the house whose probe got furthest is
    /// re-searched without one.
    pub fn validate_layout(&mut self) -> Result<bool, Error> {
        self.position = None;
        let houses: Vec<Box<[CellIndex]>> = self.solver.houses().to_vec();
        if houses.is_empty() {
            self.solver.reset();
            let run = self.solver.start_run(YieldMode::OnSolution);
            return Ok(self.solver.next_event(&run)?.is_some());
        }
        let budget = self.config.layout_contradiction_budget;
        let mut best: Option<(usize, f64)> = None;
        for (i, house) in houses.iter().enumerate() {
            match self.probe_house(house, Some(budget))? {
                Some(verdict) => return Ok(verdict),
                None => {
                    let progress = self.solver.counters().progress_ratio;
                    if best.map_or(true, |(_, p)| progress > p) {
                        best = Some((i, progress));
                    }
                }
            }
        }
        let (i, _) = best.expect("at least one house was probed");
        match self.probe_house(&houses[i], None)? {
            Some(verdict) => Ok(verdict),
            None => unreachable!("unbudgeted probe always reaches a verdict"),
        }
    }

    // Searches with the house pinned to the identity permutation. Returns
    // Some(true) on a solution, Some(false) on exhaustion, None if the
    // budget ran out first.
    fn probe_house(
        &mut self,
        house: &[CellIndex],
        budget: Option<u64>,
    ) -> Result<Option<bool>, Error> {
        let givens: Vec<(CellIndex, ValueSet)> = house
            .iter()
            .enumerate()
            .map(|(k, &c)| (c, ValueSet::from_value((k + 1) as CellValue)))
            .collect();
        self.solver.reset_with_givens(&givens);
        let run = self.solver.start_run(YieldMode::OnContradiction(1));
        let mut contradictions = 0;
        loop {
            match self.solver.next_event(&run)? {
                Some(ev) if ev.is_solution => return Ok(Some(true)),
                Some(_) => {
                    contradictions += 1;
                    if let Some(b) = budget {
                        if contradictions >= b {
                            return Ok(None);
                        }
                    }
                }
                None => return Ok(Some(false)),
            }
        }
    }
}

fn step_result(shape: &Shape, ev: SolverEvent) -> StepResult {
    let diff = match &ev.old_grid {
        Some(old) => old
            .iter()
            .zip(ev.grid.iter())
            .map(|(o, g)| o.without(*g))
            .collect(),
        None => vec![ValueSet::EMPTY; ev.grid.len()],
    };
    StepResult {
        diff_pencilmarks: diff,
        latest_cell: ev.latest_cell.map(|c| shape.cell_id(c)),
        is_solution: ev.is_solution,
        has_contradiction: ev.has_contradiction,
        values: ev.values,
        pencilmarks: ev.grid,
    }
}
