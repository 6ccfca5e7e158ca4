use crate::core::CellIndex;

/// Handlers are addressed by their index into the finalized handler array.
pub type HandlerId = usize;

const NOT_QUEUED: i32 = -2;
const TAIL: i32 = -1;

/// Work queue of handlers awaiting execution during a propagation drain.
///
/// A FIFO with set-membership dedup: a handler is in the queue at most once
/// at any time, but may be re-enqueued (and so run again) after it has been
/// popped. Implemented as an intrusive singly-linked list embedded in an
/// array indexed by handler id, so no operation allocates. `next[i] == -2`
/// means "not in list", `-1` is the tail sentinel, anything else is the id
/// of the next queued handler.
///
/// Exclusion enforcers are pushed to the *head* so the cheapest eliminations
/// run before ordinary handlers; everything else appends, which keeps the
/// drain starvation-free.
#[derive(Debug, Clone)]
pub struct HandlerAccumulator {
    next: Vec<i32>,
    head: i32,
    tail: i32,
    ordinary_by_cell: Vec<Box<[HandlerId]>>,
    aux_by_cell: Vec<Box<[HandlerId]>>,
    exclusion_by_cell: Vec<HandlerId>,
    aux_enabled: bool,
}

impl HandlerAccumulator {
    pub fn new(
        num_handlers: usize,
        ordinary_by_cell: Vec<Box<[HandlerId]>>,
        aux_by_cell: Vec<Box<[HandlerId]>>,
        exclusion_by_cell: Vec<HandlerId>,
    ) -> Self {
        HandlerAccumulator {
            next: vec![NOT_QUEUED; num_handlers],
            head: -1,
            tail: -1,
            ordinary_by_cell,
            aux_by_cell,
            exclusion_by_cell,
            aux_enabled: true,
        }
    }

    /// Auxiliary handlers only run while the grid is incomplete; the driver
    /// flips this off once every cell is covered by the search path.
    pub fn set_aux_enabled(&mut self, enabled: bool) {
        self.aux_enabled = enabled;
    }

    /// Appends every ordinary handler attached to `cell` that is not
    /// already queued.
    pub fn add_for_cell(&mut self, cell: CellIndex) {
        for i in 0..self.ordinary_by_cell[cell].len() {
            self.enqueue(self.ordinary_by_cell[cell][i]);
        }
    }

    /// Appends the auxiliary handlers attached to `cell`, if auxiliary
    /// scheduling is enabled.
    pub fn add_aux_for_cell(&mut self, cell: CellIndex) {
        if !self.aux_enabled {
            return;
        }
        for i in 0..self.aux_by_cell[cell].len() {
            self.enqueue(self.aux_by_cell[cell][i]);
        }
    }

    /// Pushes the exclusion enforcer for a just-fixed cell to the head of
    /// the queue.
    pub fn add_for_fixed_cell(&mut self, cell: CellIndex) {
        self.push_front(self.exclusion_by_cell[cell]);
    }

    pub fn take_next(&mut self) -> Option<HandlerId> {
        if self.head < 0 {
            return None;
        }
        let id = self.head as usize;
        self.head = self.next[id];
        if self.head < 0 {
            self.tail = -1;
        }
        self.next[id] = NOT_QUEUED;
        Some(id)
    }

    pub fn is_empty(&self) -> bool {
        self.head < 0
    }

    pub fn clear(&mut self) {
        while self.take_next().is_some() {}
    }

    fn enqueue(&mut self, id: HandlerId) {
        if self.next[id] != NOT_QUEUED {
            return;
        }
        if self.tail < 0 {
            self.head = id as i32;
        } else {
            self.next[self.tail as usize] = id as i32;
        }
        self.tail = id as i32;
        self.next[id] = TAIL;
    }

    fn push_front(&mut self, id: HandlerId) {
        if self.next[id] != NOT_QUEUED {
            return;
        }
        if self.head < 0 {
            self.tail = id as i32;
            self.next[id] = TAIL;
        } else {
            self.next[id] = self.head;
        }
        self.head = id as i32;
    }
}
