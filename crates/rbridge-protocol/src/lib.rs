//! Shared wire types for the script runtime / spreadsheet host bridge.
//!
//! Two layers live here:
//! - **Wire values** (`wire.rs`): the tagged union every cross-boundary value
//!   is carried in (scalars, arrays, range references, foreign objects, errors).
//! - **Envelopes** (`envelope.rs`): one request or response, correlated by id,
//!   carrying a function call, a result, an error, or one of the auxiliary
//!   operations (code execution, function catalog, console traffic).
//!
//! Everything derives `serde` traits. The transport encoding is JSON, one
//! envelope per line when streamed, with field names following the proto3
//! JSON mapping of the message schema used by existing peers.
//!
//! # Example
//!
//! ```rust
//! use rbridge_protocol::{Array, CallEnvelope, WireValue};
//!
//! let value = WireValue::array(Array::flat(vec![1.into(), 2.into(), 3.into()]));
//! let response = CallEnvelope::result(7, value);
//! let json = serde_json::to_string(&response).unwrap();
//! let back: CallEnvelope = serde_json::from_str(&json).unwrap();
//! assert_eq!(back, response);
//! ```

pub mod envelope;
mod json;
pub mod wire;

pub use envelope::{CallEnvelope, CallTarget, Code, ConsoleMessage, FunctionCall, FunctionList, Operation};
pub use wire::{
    ArgumentDescriptor, Array, CallKind, Complex, EnumDescriptor, EnumValue, ErrorKind,
    ErrorValue, ForeignObjectRef, FunctionDescriptor, RangeRef, Value, WireValue,
};
