//! The script runtime as seen by the bridge.
//!
//! The bridge never embeds an interpreter itself. It drives one through
//! [`Runtime`], which is small enough to implement over an embedded R session
//! or over a test double.

use std::rc::Rc;

use crate::error::Result;
use crate::value::{EnvId, RValue, S4Object};

/// Creates instances of classes defined in the runtime.
pub trait ObjectFactory {
    /// A fresh instance of `class`, or `None` if the class is not defined.
    fn new_object(&self, class: &str) -> Option<S4Object>;
}

/// An object factory with no classes defined.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObjects;

impl ObjectFactory for NoObjects {
    fn new_object(&self, _class: &str) -> Option<S4Object> {
        None
    }
}

/// Evaluation entry points of the script runtime.
pub trait Runtime: ObjectFactory {
    /// The global evaluation context.
    fn global_env(&self) -> EnvId;

    /// Look up `name` starting from `env`. Fails if it is not bound.
    fn get(&self, name: &str, env: EnvId) -> Result<RValue>;

    /// Call the function bound to `function` in `env` with positional
    /// arguments. Errors raised by the callee are returned as
    /// [`BridgeError::Evaluation`](crate::BridgeError::Evaluation).
    fn call(&self, env: EnvId, function: &str, args: Vec<RValue>) -> Result<RValue>;

    /// Parse and evaluate source lines in the global context, returning the
    /// value of the last expression.
    fn evaluate(&self, lines: &[String]) -> Result<RValue>;
}

impl<T: ObjectFactory + ?Sized> ObjectFactory for Rc<T> {
    fn new_object(&self, class: &str) -> Option<S4Object> {
        (**self).new_object(class)
    }
}

impl<T: Runtime + ?Sized> Runtime for Rc<T> {
    fn global_env(&self) -> EnvId {
        (**self).global_env()
    }

    fn get(&self, name: &str, env: EnvId) -> Result<RValue> {
        (**self).get(name, env)
    }

    fn call(&self, env: EnvId, function: &str, args: Vec<RValue>) -> Result<RValue> {
        (**self).call(env, function, args)
    }

    fn evaluate(&self, lines: &[String]) -> Result<RValue> {
        (**self).evaluate(lines)
    }
}
