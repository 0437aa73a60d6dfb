use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

/// Status codes returned across the storage engine boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Generic = -1,
    NotFound = -3,
    Exists = -4,
    User = -7,
    InvalidSpec = -12,
    Peel = -19,
    Invalid = -21,
    Mismatch = -33,
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// The subsystem an error was raised in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    None,
    Os,
    Reference,
    Odb,
    Tag,
    Callback,
}

/// Detail for the most recent failure on this thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastError {
    pub class: ErrorClass,
    pub message: String,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<LastError>> = const { RefCell::new(None) };
}

/// record the error detail for the current thread
pub fn set_error(class: ErrorClass, message: impl Into<String>) {
    let error = LastError {
        class,
        message: message.into(),
    };
    LAST_ERROR.with(|last| *last.borrow_mut() = Some(error));
}

pub(crate) fn has_error() -> bool {
    LAST_ERROR.with(|last| last.borrow().is_some())
}

fn clear_error() {
    LAST_ERROR.with(|last| last.borrow_mut().take());
}

/// record the detail and return the code, for `return raise(..)` style exits
pub fn raise<T>(
    code: ErrorCode,
    class: ErrorClass,
    message: impl Into<String>,
) -> Result<T, ErrorCode> {
    set_error(class, message);
    Err(code)
}

/// Translate a Rust error into an engine status, recording its message.
pub trait RaiseExt<T> {
    fn or_raise(self, code: ErrorCode, class: ErrorClass) -> Result<T, ErrorCode>;
}

impl<T, E: fmt::Display> RaiseExt<T> for Result<T, E> {
    fn or_raise(self, code: ErrorCode, class: ErrorClass) -> Result<T, ErrorCode> {
        self.or_else(|e| raise(code, class, format!("{:#}", e)))
    }
}

/// Keeps a sequence of engine calls and the read-back of their error detail
/// on one thread.
///
/// Pinning clears any stale detail; dropping the pin clears it again. The
/// guard is `!Send`, so it cannot leave the thread it was created on.
pub struct ThreadPin {
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl ThreadPin {
    pub fn pin() -> Self {
        clear_error();

        Self {
            thread: thread::current().id(),
            _not_send: PhantomData,
        }
    }

    /// take the detail recorded by the last failing call
    pub fn take_error(&self) -> Option<LastError> {
        debug_assert_eq!(self.thread, thread::current().id());
        LAST_ERROR.with(|last| last.borrow_mut().take())
    }
}

impl Drop for ThreadPin {
    fn drop(&mut self) {
        clear_error();
    }
}
