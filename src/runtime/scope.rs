use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{RuntimeType, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Slot addresses are two-region: the global region lives for the whole
/// engine (so cached binders stay valid across invocations and implicit
/// globals survive), the frame region is fresh per invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotIndex {
    Global(usize),
    Frame(usize),
}

#[derive(Clone, Debug)]
pub struct LocalVariable {
    pub name: Rc<str>,
    pub ty: RuntimeType,
    pub slot: SlotIndex,
}

#[derive(Debug)]
struct Slot {
    name: Rc<str>,
    ty: RuntimeType,
    value: Value,
}

#[derive(Debug, Default)]
struct StoreInner {
    globals: Vec<Slot>,
    frames: Vec<Slot>,
    marks: Vec<usize>,
}

impl StoreInner {
    fn current_frame(&self) -> Option<&[Slot]> {
        self.marks.last().map(|&mark| &self.frames[mark..])
    }
}

/// Insertion-ordered name→slot table with nested block scoping. Interior
/// mutability lets a `ScopeGuard` borrow the store while evaluation keeps
/// declaring and reading through it.
#[derive(Debug, Default)]
pub struct ScopeStore {
    inner: RefCell<StoreInner>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all frame-region state; the global region persists.
    pub fn begin_invocation(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.frames.clear();
        inner.marks.clear();
    }

    /// Declares in the current frame; with no frame entered the root
    /// (global) region is the current frame.
    pub fn declare(
        &self,
        name: &str,
        ty: RuntimeType,
        value: Value,
    ) -> RuntimeResult<LocalVariable> {
        let mut inner = self.inner.borrow_mut();
        if inner.marks.is_empty() {
            return declare_global(&mut inner, name, ty, value);
        }
        if inner
            .current_frame()
            .is_some_and(|frame| frame.iter().any(|slot| &*slot.name == name))
        {
            return Err(RuntimeError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }
        let slot = SlotIndex::Frame(inner.frames.len());
        let name: Rc<str> = name.into();
        inner.frames.push(Slot {
            name: name.clone(),
            ty: ty.clone(),
            value,
        });
        Ok(LocalVariable { name, ty, slot })
    }

    /// Always targets the outermost frame; used for implicit-global
    /// creation when assignment finds no declared variable.
    pub fn declare_at_root(
        &self,
        name: &str,
        ty: RuntimeType,
        value: Value,
    ) -> RuntimeResult<LocalVariable> {
        let mut inner = self.inner.borrow_mut();
        declare_global(&mut inner, name, ty, value)
    }

    /// Innermost match wins; frame slots shadow globals.
    pub fn lookup(&self, name: &str) -> Option<LocalVariable> {
        let inner = self.inner.borrow();
        for (index, slot) in inner.frames.iter().enumerate().rev() {
            if &*slot.name == name {
                return Some(LocalVariable {
                    name: slot.name.clone(),
                    ty: slot.ty.clone(),
                    slot: SlotIndex::Frame(index),
                });
            }
        }
        for (index, slot) in inner.globals.iter().enumerate().rev() {
            if &*slot.name == name {
                return Some(LocalVariable {
                    name: slot.name.clone(),
                    ty: slot.ty.clone(),
                    slot: SlotIndex::Global(index),
                });
            }
        }
        None
    }

    pub fn read(&self, slot: SlotIndex) -> RuntimeResult<Value> {
        let inner = self.inner.borrow();
        let found = match slot {
            SlotIndex::Global(index) => inner.globals.get(index),
            SlotIndex::Frame(index) => inner.frames.get(index),
        };
        found
            .map(|slot| slot.value.clone())
            .ok_or_else(|| unbound(slot))
    }

    pub fn write(&self, slot: SlotIndex, value: Value) -> RuntimeResult<()> {
        let mut inner = self.inner.borrow_mut();
        let found = match slot {
            SlotIndex::Global(index) => inner.globals.get_mut(index),
            SlotIndex::Frame(index) => inner.frames.get_mut(index),
        };
        match found {
            Some(slot) => {
                slot.value = value;
                Ok(())
            }
            None => Err(unbound(slot)),
        }
    }

    /// Enters a block scope. Dropping the guard removes every frame
    /// variable declared since entry, in reverse declaration order, on
    /// every exit path.
    pub fn enter(&self) -> ScopeGuard<'_> {
        let mut inner = self.inner.borrow_mut();
        let mark = inner.frames.len();
        inner.marks.push(mark);
        ScopeGuard { store: self }
    }

    pub fn globals_len(&self) -> usize {
        self.inner.borrow().globals.len()
    }

    pub fn frames_len(&self) -> usize {
        self.inner.borrow().frames.len()
    }
}

fn declare_global(
    inner: &mut StoreInner,
    name: &str,
    ty: RuntimeType,
    value: Value,
) -> RuntimeResult<LocalVariable> {
    if inner.globals.iter().any(|slot| &*slot.name == name) {
        return Err(RuntimeError::DuplicateDeclaration {
            name: name.to_string(),
        });
    }
    let slot = SlotIndex::Global(inner.globals.len());
    let name: Rc<str> = name.into();
    inner.globals.push(Slot {
        name: name.clone(),
        ty: ty.clone(),
        value,
    });
    Ok(LocalVariable { name, ty, slot })
}

fn unbound(slot: SlotIndex) -> RuntimeError {
    RuntimeError::InvalidOperation {
        message: format!("unbound local slot {slot:?}"),
    }
}

pub struct ScopeGuard<'a> {
    store: &'a ScopeStore,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.store.inner.borrow_mut();
        if let Some(mark) = inner.marks.pop() {
            while inner.frames.len() > mark {
                inner.frames.pop();
            }
        }
    }
}
