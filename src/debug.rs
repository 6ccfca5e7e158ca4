use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Mutex;

use rand::distr::{Bernoulli, Distribution};
use rand::rngs::ThreadRng;

use crate::core::CellIndex;

struct ConstStringRegistry {
    mapping: HashMap<&'static str, usize>,
    next_id: usize,
}

impl ConstStringRegistry {
    fn new() -> Self {
        Self {
            mapping: HashMap::new(),
            next_id: 0,
        }
    }

    fn register(&mut self, name: &'static str) -> usize {
        if let Some(id) = self.mapping.get(name) {
            *id
        } else {
            let id = self.next_id;
            self.mapping.insert(name, id);
            self.next_id += 1;
            id
        }
    }
}

lazy_static::lazy_static! {
    static ref LOC_REGISTRY: Mutex<ConstStringRegistry> =
        Mutex::new(ConstStringRegistry::new());
}

/// Interned identifier for a log site (e.g. `"engine.contradiction"`).
/// Registration is cheap after the first call for a given name, so sites
/// can register lazily in cold paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    name: &'static str,
    id: usize,
}

impl Loc {
    pub fn register(name: &'static str) -> Self {
        let id = LOC_REGISTRY.lock().unwrap().register(name);
        Loc { name, id }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

/// One structured record in the debug sink.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugRecord {
    pub loc: Loc,
    pub msg: String,
    pub cells: Vec<CellIndex>,
}

impl Display for DebugRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.loc.name(), self.msg)?;
        if !self.cells.is_empty() {
            write!(f, " cells={:?}", self.cells)?;
        }
        Ok(())
    }
}

enum SampleState {
    Always,
    EveryN(usize, usize),
    Probability(Bernoulli, ThreadRng),
}

/// Throttle for log emission, so step-mode introspection on big searches
/// doesn't drown in records.
pub struct Sample {
    state: SampleState,
}

impl Sample {
    pub fn always() -> Self {
        Self {
            state: SampleState::Always,
        }
    }

    pub fn every_n(n: usize) -> Self {
        Self {
            state: SampleState::EveryN(n, 0),
        }
    }

    pub fn probability(p: f64) -> Self {
        Self {
            state: SampleState::Probability(Bernoulli::new(p).unwrap(), rand::rng()),
        }
    }

    fn sample(&mut self) -> bool {
        match &mut self.state {
            SampleState::Always => true,
            SampleState::EveryN(n, count) => {
                *count += 1;
                if count >= n {
                    *count = 0;
                    true
                } else {
                    false
                }
            }
            SampleState::Probability(d, rng) => d.sample(rng),
        }
    }
}

/// Structured log sink for step-mode introspection.
///
/// Disabled is the default and must stay free: callers guard every log site
/// with `enabled()` so no record (or message string) is ever built on the
/// hot path. Logging through a disabled sink is a contract violation and
/// panics.
pub struct DebugLog {
    enabled: bool,
    sample: Sample,
    records: Vec<DebugRecord>,
}

impl DebugLog {
    pub fn disabled() -> Self {
        DebugLog {
            enabled: false,
            sample: Sample::always(),
            records: Vec::new(),
        }
    }

    pub fn enabled_with(sample: Sample) -> Self {
        DebugLog {
            enabled: true,
            sample,
            records: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Emits a record, subject to sampling. The record is built by the
    /// closure so that callers pay nothing when the site is sampled out.
    pub fn log<F: FnOnce() -> DebugRecord>(&mut self, f: F) {
        if !self.enabled {
            panic!("Debug logging while the sink is disabled");
        }
        if self.sample.sample() {
            self.records.push(f());
        }
    }

    /// Dump of the backtrack-trigger histogram, recorded as a single
    /// record listing the nonzero cells.
    pub fn dump_backtrack_triggers(&mut self, bt: &[u32]) {
        let loc = Loc::register("debug.backtrack_triggers");
        self.log(|| {
            let mut cells = Vec::new();
            let mut parts = Vec::new();
            for (c, &n) in bt.iter().enumerate() {
                if n > 0 {
                    cells.push(c);
                    parts.push(format!("{}:{}", c, n));
                }
            }
            DebugRecord {
                loc,
                msg: parts.join(" "),
                cells,
            }
        });
    }

    pub fn records(&self) -> &[DebugRecord] {
        &self.records
    }

    pub fn take_records(&mut self) -> Vec<DebugRecord> {
        std::mem::take(&mut self.records)
    }
}
