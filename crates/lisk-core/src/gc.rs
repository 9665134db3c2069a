//! Heap arena and mark-and-sweep collection.
//!
//! Cells live in a per-interpreter slab; a free list recycles swept slots.
//! Every live slot is enumerable, which is exactly what the sweep phase
//! needs (the allocation list of a malloc-based design collapses into the
//! slab itself). Marking runs over an explicit work list so arbitrarily
//! deep structures cannot overflow the host stack.

use log::debug;

use crate::cell::{Cell, CellKind, CellRef, UserTypeOps};

/// Collector tuning parameters.
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Allocations between automatic collections when the collector is on.
    pub collection_point: usize,
    /// Initial capacity of the root stack.
    pub root_stack_capacity: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            collection_point: 1 << 20,
            root_stack_capacity: 256,
        }
    }
}

/// Collector switch. `Off` is permanent: once disabled this way the
/// collector refuses to be re-enabled for the lifetime of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    /// Collection runs at allocation boundaries.
    On,
    /// Triggering is suspended but the collector may be re-enabled.
    Postpone,
    /// Permanently disabled.
    Off,
}

/// Counters reported by one sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub freed: usize,
    pub survived: usize,
}

/// The per-interpreter cell arena.
pub struct Heap {
    slots: Vec<Option<Cell>>,
    free: Vec<u32>,
    live: usize,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of live cells.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Places a cell in the arena and returns its reference.
    pub fn alloc(&mut self, cell: Cell) -> CellRef {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(cell);
            CellRef::from_raw(index)
        } else {
            self.slots.push(Some(cell));
            CellRef::from_raw((self.slots.len() - 1) as u32)
        }
    }

    /// Immutable access to a live cell. A dangling reference is an
    /// internal inconsistency and halts.
    pub fn get(&self, r: CellRef) -> &Cell {
        match self.slots.get(r.index() as usize) {
            Some(Some(cell)) => cell,
            _ => panic!("internal inconsistency: dangling cell reference {r:?}"),
        }
    }

    /// Mutable access to a live cell.
    pub fn get_mut(&mut self, r: CellRef) -> &mut Cell {
        match self.slots.get_mut(r.index() as usize) {
            Some(Some(cell)) => cell,
            _ => panic!("internal inconsistency: dangling cell reference {r:?}"),
        }
    }

    /// True if `r` names a live slot.
    pub fn contains(&self, r: CellRef) -> bool {
        matches!(self.slots.get(r.index() as usize), Some(Some(_)))
    }

    /// Marks everything reachable from `roots`, honoring user-type mark
    /// callbacks. Returns the number of cells marked.
    pub fn mark_from(&mut self, roots: &[CellRef], user_types: &[UserTypeOps]) -> usize {
        let mut work: Vec<CellRef> = roots.to_vec();
        let mut marked = 0;
        while let Some(r) = work.pop() {
            let cell = match self.slots.get_mut(r.index() as usize) {
                Some(Some(cell)) => cell,
                _ => continue,
            };
            if cell.uncollectable || cell.mark {
                continue;
            }
            cell.mark = true;
            marked += 1;
            match &cell.kind {
                CellKind::Cons(car, cdr) => {
                    work.push(*car);
                    work.push(*cdr);
                }
                CellKind::Proc(p) | CellKind::FProc(p) => {
                    work.push(p.args);
                    work.push(p.code);
                    work.push(p.env);
                    work.push(p.doc);
                }
                CellKind::Subr(s) => work.push(s.doc),
                CellKind::Hash(h) => work.extend(h.values()),
                CellKind::User(u) => {
                    if let Some(mark) = user_types.get(u.tag.0 as usize).and_then(|t| t.mark) {
                        work.extend(mark(&*u.data));
                    }
                }
                _ => {}
            }
        }
        marked
    }

    /// Frees every unmarked collectible cell, running tag-specific
    /// finalizers, and clears the mark on survivors.
    pub fn sweep(&mut self, user_types: &[UserTypeOps]) -> SweepStats {
        let mut stats = SweepStats::default();
        for index in 0..self.slots.len() {
            match &mut self.slots[index] {
                Some(cell) if cell.uncollectable => continue,
                Some(cell) if cell.mark => {
                    cell.mark = false;
                    stats.survived += 1;
                    continue;
                }
                Some(_) => {}
                None => continue,
            }
            if let Some(cell) = self.slots[index].take() {
                finalize(cell, user_types);
                self.free.push(index as u32);
                self.live -= 1;
                stats.freed += 1;
            }
        }
        debug!(
            "gc sweep: freed {} cells, {} survived, {} live",
            stats.freed, stats.survived, self.live
        );
        stats
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

/// Releases the resources owned by a freed cell. Owned byte strings and
/// hash tables are dropped; ports are closed; user cells go through their
/// registered finalizer.
fn finalize(cell: Cell, user_types: &[UserTypeOps]) {
    match cell.kind {
        CellKind::Io(mut port) => port.close(),
        CellKind::User(u) => {
            if let Some(free) = user_types.get(u.tag.0 as usize).and_then(|t| t.free) {
                free(u.data);
            }
        }
        _ => {}
    }
}
