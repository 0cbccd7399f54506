//! Foreign object handles.
//!
//! The host owns every foreign object. The runtime side only holds the
//! address plus an obligation to tell the host when its wrapper is collected.
//! `ForeignHandle` carries that obligation and discharges it exactly once, in
//! `Drop`; `ExternalPtr` is the shared, reference-counted wrapper the runtime
//! value model stores, so the release fires when the last copy goes away.

use std::fmt;
use std::rc::Rc;

/// Receives release notifications for foreign handles.
pub trait ReleaseHook {
    fn release(&self, handle: u64);
}

impl<F: Fn(u64)> ReleaseHook for F {
    fn release(&self, handle: u64) {
        self(handle)
    }
}

/// A non-owning reference to a host object.
pub struct ForeignHandle {
    address: u64,
    hook: Option<Rc<dyn ReleaseHook>>,
}

impl ForeignHandle {
    /// A handle with no release obligation.
    pub fn borrowed(address: u64) -> Self {
        Self {
            address,
            hook: None,
        }
    }

    /// A handle that notifies `hook` when dropped.
    pub fn with_release(address: u64, hook: Rc<dyn ReleaseHook>) -> Self {
        Self {
            address,
            hook: Some(hook),
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn has_release_obligation(&self) -> bool {
        self.hook.is_some()
    }
}

impl Drop for ForeignHandle {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            tracing::trace!("releasing foreign handle {:#x}", self.address);
            hook.release(self.address);
        }
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHandle")
            .field("address", &format_args!("{:#x}", self.address))
            .field("release", &self.hook.is_some())
            .finish()
    }
}

/// Runtime-side wrapper around a [`ForeignHandle`]. Clones share the handle.
#[derive(Clone)]
pub struct ExternalPtr(Rc<ForeignHandle>);

impl ExternalPtr {
    pub fn new(handle: ForeignHandle) -> Self {
        ExternalPtr(Rc::new(handle))
    }

    pub fn address(&self) -> u64 {
        self.0.address()
    }

    /// Number of live wrappers sharing this handle.
    pub fn wrapper_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl PartialEq for ExternalPtr {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl fmt::Debug for ExternalPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<pointer: {:#x}>", self.address())
    }
}
