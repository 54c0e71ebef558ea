//! C1: the tape allocator. A `Scope` maps names and
//! anonymous temporaries to cells of one conceptual infinite tape,
//! reusing freed cells via a free list and honouring a per-function
//! "reservation window" for named cells.
//!
//! `Variable` mirrors `examples/original_source/bf_space.hpp`'s
//! `Variable`/`Env` pair: a `Variable` is a handle into the `Scope`
//! that allocated it. Since Rust has no destructor ordering tied to a
//! raw back-pointer the way C++ does, each `Scope` node is a
//! `Rc<RefCell<..>>` and a `Variable` holds a clone of the handle for
//! the exact node that owns its region — this is the "indices + a
//! scope handle passed by non-owning reference" shape the original's
//! design calls for, built with `Rc`/`RefCell` instead of a raw pointer.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::error::ScopeError;

type ScopeHandle = Rc<RefCell<ScopeInner>>;

#[derive(Debug)]
struct ScopeInner {
    parent: Option<ScopeHandle>,
    named_reservation_size: i64,
    next_free: i64,
    free_list: BTreeSet<i64>,
    temp_sizes: HashMap<i64, u32>,
    vars: HashMap<String, i64>,
    named_cell_counter: i64,
}

impl ScopeInner {
    fn num_named_cells(&self) -> i64 {
        let parent = self
            .parent
            .as_ref()
            .map_or(0, |p| p.borrow().num_named_cells());
        self.named_cell_counter + parent
    }

    /// `next_free_region`: scan the free list for a contiguous run of
    /// `size` cells; tie-break by lowest start index; fall back to the
    /// watermark.
    fn next_free_region(&mut self, size: u32) -> i64 {
        let size = size as i64;
        let mut chosen = None;
        for &start in &self.free_list {
            let mut ok = true;
            for i in 1..size {
                let probe = start + i;
                if !self.free_list.contains(&probe) && probe < self.next_free {
                    ok = false;
                    break;
                }
            }
            if ok {
                chosen = Some(start);
                break;
            }
        }
        let start = chosen.unwrap_or(self.next_free);
        for i in 0..size {
            self.free_list.remove(&(start + i));
        }
        self.next_free = self.next_free.max(start + size);
        start
    }

    fn remove(&mut self, index: i64) -> Result<(), ScopeError> {
        if index >= self.next_free || self.free_list.contains(&index) {
            return Err(ScopeError::DoubleFree(index));
        }
        let size = self.temp_sizes.remove(&index).unwrap_or(1) as i64;
        for i in 0..size {
            self.free_list.insert(index + i);
        }
        Ok(())
    }
}

/// A handle to a tape region. Movable, not
/// copyable: dropping an anonymous (temporary) variable releases its
/// region back to the owning scope.
#[derive(Debug)]
pub struct Variable {
    scope: ScopeHandle,
    index: i64,
    size: u32,
    name: Option<String>,
}

impl Variable {
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_temp(&self) -> bool {
        self.name.is_none()
    }

    /// A view of the `num`-th cell before this variable's start index,
    /// aliasing the same region without taking ownership of it —
    /// `examples/original_source/bf_space.hpp`'s `get_predecessor`.
    /// Used by `op_call_function` to read a caller's argument after the
    /// frame pointer has already jumped past it.
    pub fn predecessor(&self, num: i64) -> Variable {
        Variable {
            scope: self.scope.clone(),
            index: self.index - num,
            size: 1,
            name: Some(format!("{}_pred{num}", self.debug_string())),
        }
    }

    /// A view of the `num`-th cell after this variable's start index,
    /// the mirror image of `predecessor` — used by array element
    /// access to name the data cell at a literal offset past the
    /// array's head.
    pub fn successor(&self, num: i64) -> Variable {
        Variable {
            scope: self.scope.clone(),
            index: self.index + num,
            size: 1,
            name: Some(format!("{}_succ{num}", self.debug_string())),
        }
    }

    pub fn debug_string(&self) -> String {
        let i = self.index;
        let i_str = if i < 0 {
            format!("neg{}", -i)
        } else {
            i.to_string()
        };
        match &self.name {
            Some(n) => format!("{n}{{{i_str}}}"),
            None => format!("~t{{{i_str}}}"),
        }
    }
}

impl Drop for Variable {
    fn drop(&mut self) {
        if self.is_temp() {
            // A generator bug (double free) here would indicate an
            // allocator invariant violation; it cannot be reported
            // through a `Result` from `Drop`, so it is surfaced as a
            // panic rather than silently corrupting the free list.
            self.scope
                .borrow_mut()
                .remove(self.index)
                .expect("temporary freed twice or out of range");
        }
    }
}

/// One lexical scope in the chain.
#[derive(Debug, Clone)]
pub struct Scope {
    handle: ScopeHandle,
}

impl Scope {
    /// A root scope with no parent — used once, for the top-level
    /// pseudo-scope that the dispatch loop lives in.
    pub fn root(named_reservation_size: i64) -> Self {
        Self {
            handle: Rc::new(RefCell::new(ScopeInner {
                parent: None,
                named_reservation_size,
                next_free: named_reservation_size,
                free_list: BTreeSet::new(),
                temp_sizes: HashMap::new(),
                vars: HashMap::new(),
                named_cell_counter: 0,
            })),
        }
    }

    /// Pushes a child scope. `min_next_free` lets a caller force the
    /// child's watermark above some value (used when entering a
    /// function body above a freshly-skipped frame).
    pub fn push(&self, min_next_free: i64) -> Scope {
        let parent_inner = self.handle.borrow();
        let named_reservation_size = parent_inner.named_reservation_size;
        let next_free = min_next_free
            .max(parent_inner.next_free)
            .max(named_reservation_size);
        drop(parent_inner);
        Scope {
            handle: Rc::new(RefCell::new(ScopeInner {
                parent: Some(self.handle.clone()),
                named_reservation_size,
                next_free,
                free_list: BTreeSet::new(),
                temp_sizes: HashMap::new(),
                vars: HashMap::new(),
                named_cell_counter: 0,
            })),
        }
    }

    /// Returns the parent scope, consuming this one.
    pub fn pop(self) -> Scope {
        let parent = self
            .handle
            .borrow()
            .parent
            .clone()
            .expect("popped the root scope");
        Scope { handle: parent }
    }

    pub fn top(&self) -> i64 {
        self.handle.borrow().next_free
    }

    pub fn num_named_cells(&self) -> i64 {
        self.handle.borrow().num_named_cells()
    }

    fn make_variable(&self, index: i64, size: u32, name: Option<String>) -> Variable {
        Variable {
            scope: self.handle.clone(),
            index,
            size,
            name,
        }
    }

    /// Adds a named variable. Packs into the reservation window from
    /// index 0 while there's room, else falls through to the bump
    /// allocator.
    pub fn add(&self, name: &str, size: u32) -> Result<Variable, ScopeError> {
        let mut inner = self.handle.borrow_mut();
        if inner.vars.contains_key(name) {
            return Err(ScopeError::DuplicateName(name.to_string()));
        }
        let used = inner.num_named_cells();
        let index = if used + size as i64 <= inner.named_reservation_size {
            used
        } else {
            inner.next_free_region(size)
        };
        inner.vars.insert(name.to_string(), index);
        if size != 1 {
            inner.temp_sizes.insert(index, size);
        }
        inner.named_cell_counter += size as i64;
        drop(inner);
        Ok(self.make_variable(index, size, Some(name.to_string())))
    }

    /// Installs `alias` in this scope at the same index as `original`
    /// (searched through the parent chain).
    pub fn add_alias(&self, original: &str, alias: &str) -> Result<Variable, ScopeError> {
        let orig = self.get(original)?;
        let mut inner = self.handle.borrow_mut();
        if inner.vars.contains_key(alias) {
            return Err(ScopeError::DuplicateName(alias.to_string()));
        }
        inner.vars.insert(alias.to_string(), orig.index);
        drop(inner);
        Ok(self.make_variable(orig.index, 1, Some(alias.to_string())))
    }

    pub fn add_or_get(&self, name: &str, size: u32) -> Result<Variable, ScopeError> {
        match self.get(name) {
            Ok(v) => Ok(v),
            Err(ScopeError::UndefinedName(_)) => self.add(name, size),
            Err(other) => Err(other),
        }
    }

    /// Searches this scope, then parents, for `name`.
    pub fn get(&self, name: &str) -> Result<Variable, ScopeError> {
        let inner = self.handle.borrow();
        if let Some(&index) = inner.vars.get(name) {
            return Ok(self.make_variable(index, 1, Some(name.to_string())));
        }
        let parent = inner.parent.clone();
        drop(inner);
        match parent {
            Some(p) => {
                let parent_scope = Scope { handle: p };
                let v = parent_scope.get(name)?;
                // Re-home the returned variable's debug identity on
                // this call; its owning scope handle is unaffected.
                Ok(v)
            }
            None => Err(ScopeError::UndefinedName(name.to_string())),
        }
    }

    /// Allocates an anonymous temporary of `size` cells.
    pub fn add_temp(&self, size: u32) -> Variable {
        let mut inner = self.handle.borrow_mut();
        let index = inner.next_free_region(size);
        if size != 1 {
            inner.temp_sizes.insert(index, size);
        }
        drop(inner);
        self.make_variable(index, size, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_vars_pack_into_reservation_window() {
        let s = Scope::root(4);
        let a = s.add("a", 1).unwrap();
        let b = s.add("b", 1).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    /// A child scope's packing must account for cells its parent already
    /// consumed in the shared reservation window, not just its own local
    /// count — otherwise it aliases the parent's named cells.
    #[test]
    fn child_scope_packs_above_parent_reservation_usage() {
        let parent = Scope::root(4);
        let a = parent.add("a", 1).unwrap();
        let b = parent.add("b", 1).unwrap();
        let child = parent.push(0);
        let c = child.add("c", 1).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 2);
        assert_ne!(c.index(), a.index());
        assert_ne!(c.index(), b.index());
    }

    #[test]
    fn temp_reuses_freed_cell() {
        let s = Scope::root(0);
        let first_index = {
            let t = s.add_temp(1);
            t.index()
        };
        let second = s.add_temp(1);
        assert_eq!(second.index(), first_index);
    }

    #[test]
    fn multi_cell_temp_is_released_as_one_region() {
        let s = Scope::root(0);
        {
            let _t = s.add_temp(3);
        }
        let t2 = s.add_temp(3);
        assert_eq!(t2.index(), 0);
    }

    #[test]
    fn duplicate_name_is_an_error() {
        let s = Scope::root(0);
        s.add("x", 1).unwrap();
        assert!(s.add("x", 1).is_err());
    }

    #[test]
    fn undefined_name_is_an_error() {
        let s = Scope::root(0);
        assert!(s.get("nope").is_err());
    }

    #[test]
    fn get_walks_parent_chain() {
        let parent = Scope::root(1);
        parent.add("x", 1).unwrap();
        let child = parent.push(0);
        let v = child.get("x").unwrap();
        assert_eq!(v.index(), 0);
    }

    #[test]
    fn non_overlapping_allocations() {
        let s = Scope::root(0);
        let a = s.add_temp(2);
        let b = s.add_temp(2);
        assert_ne!(a.index(), b.index());
        assert!((a.index() - b.index()).unsigned_abs() >= 2);
    }
}
