//! Handles for passing caller state through the storage engine.
//!
//! The engine's iteration functions pass an opaque [`Handle`] back to every
//! callback invocation. The callback looks the payload up again by handle, so
//! the only thing crossing the boundary is an index into a registry owned by
//! the calling thread.

use crate::store::ErrorCode;
use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;

/// Opaque token naming a tracked payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(usize);

enum Slot {
    Vacant,
    Occupied(Box<dyn Any>),
    /// payload is out for a callback in progress
    Lent,
}

/// Registry of tracked payloads; freed indexes are reused lowest first.
#[derive(Default)]
struct HandleList {
    slots: Vec<Slot>,
}

impl HandleList {
    fn track(&mut self, payload: Box<dyn Any>) -> Handle {
        let index = match self.slots.iter().position(|s| matches!(s, Slot::Vacant)) {
            Some(index) => {
                self.slots[index] = Slot::Occupied(payload);
                index
            }
            None => {
                self.slots.push(Slot::Occupied(payload));
                self.slots.len() - 1
            }
        };

        Handle(index)
    }

    fn untrack(&mut self, handle: Handle) -> Option<Box<dyn Any>> {
        let slot = self
            .slots
            .get_mut(handle.0)
            .unwrap_or_else(|| panic!("untrack of unknown handle {:?}", handle));

        match std::mem::replace(slot, Slot::Vacant) {
            Slot::Occupied(payload) => Some(payload),
            Slot::Lent => None,
            Slot::Vacant => panic!("handle {:?} untracked twice", handle),
        }
    }

    fn lend(&mut self, handle: Handle) -> Box<dyn Any> {
        let slot = self
            .slots
            .get_mut(handle.0)
            .unwrap_or_else(|| panic!("could not retrieve handle {:?}", handle));

        match std::mem::replace(slot, Slot::Lent) {
            Slot::Occupied(payload) => payload,
            other => {
                *slot = other;
                panic!("handle {:?} is not available", handle)
            }
        }
    }

    fn restore(&mut self, handle: Handle, payload: Box<dyn Any>) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            if matches!(slot, Slot::Lent) {
                *slot = Slot::Occupied(payload);
            }
        }
    }

    fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s, Slot::Vacant))
            .count()
    }
}

thread_local! {
    static POINTER_HANDLES: RefCell<HandleList> = RefCell::new(HandleList::default());
}

/// A payload registered with the current thread's handle registry.
///
/// The registry entry is released exactly once: by [`Tracked::release`], or
/// when the guard is dropped on any other exit path, unwinding included.
pub struct Tracked<T: 'static> {
    handle: Option<Handle>,
    _payload: PhantomData<T>,
    _not_send: PhantomData<*const ()>,
}

/// register `payload` and return a guard owning its handle
pub fn track<T: 'static>(payload: T) -> Tracked<T> {
    let handle = POINTER_HANDLES.with(|handles| handles.borrow_mut().track(Box::new(payload)));

    Tracked {
        handle: Some(handle),
        _payload: PhantomData,
        _not_send: PhantomData,
    }
}

impl<T: 'static> Tracked<T> {
    pub fn handle(&self) -> Handle {
        match self.handle {
            Some(handle) => handle,
            None => unreachable!("handle used after release"),
        }
    }

    /// untrack the handle and hand the payload back
    pub fn release(mut self) -> T {
        let handle = self.handle();
        self.handle = None;

        let payload = POINTER_HANDLES.with(|handles| handles.borrow_mut().untrack(handle));

        match payload.map(|p| p.downcast::<T>()) {
            Some(Ok(payload)) => *payload,
            _ => panic!("could not retrieve payload for handle {:?}", handle),
        }
    }
}

impl<T: 'static> Drop for Tracked<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // the registry may already be gone during thread teardown
            let _ = POINTER_HANDLES.try_with(|handles| handles.borrow_mut().untrack(handle));
        }
    }
}

/// Run `f` against the payload tracked under `handle`.
///
/// The registry is not borrowed while `f` runs, so `f` may itself track new
/// handles. Panics if the handle is unknown or holds a different type.
pub fn dispatch<T: 'static, R>(handle: Handle, f: impl FnOnce(&mut T) -> R) -> R {
    let mut payload = POINTER_HANDLES.with(|handles| handles.borrow_mut().lend(handle));

    let ret = match payload.downcast_mut::<T>() {
        Some(data) => f(data),
        None => panic!("could not retrieve payload for handle {:?}", handle),
    };

    POINTER_HANDLES.with(|handles| handles.borrow_mut().restore(handle, payload));

    ret
}

/// number of live handles on this thread
pub fn tracked_count() -> usize {
    POINTER_HANDLES.with(|handles| handles.borrow().len())
}

/// The slot for the first error returned by a caller-supplied visitor.
///
/// Only this slot is tracked; the visitor itself stays on the caller's stack,
/// so it may borrow local state.
#[derive(Default)]
pub struct CallbackData {
    pub error: Option<anyhow::Error>,
}

impl CallbackData {
    /// turn a visitor result into the status handed back to the engine
    pub fn record(&mut self, result: anyhow::Result<()>) -> ErrorCode {
        match result {
            Ok(()) => ErrorCode::Ok,
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
                ErrorCode::User
            }
        }
    }
}
