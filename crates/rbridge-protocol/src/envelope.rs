//! Call/response envelopes.
//!
//! The same envelope type travels in both directions: a request carries a
//! [`FunctionCall`] (or code to execute), the response to it carries a
//! result or an error. A response may itself carry a `FunctionCall` when the
//! peer needs the caller to evaluate something before it can answer.

use serde::{Deserialize, Serialize};

use crate::wire::{CallKind, FunctionDescriptor, WireValue};

/// One request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Correlation id, assigned by the initiating side.
    #[serde(default)]
    pub id: u32,
    /// Whether the caller blocks for a result.
    #[serde(default)]
    pub wait: bool,
    #[serde(flatten)]
    pub operation: Operation,
}

/// The payload of an envelope. Exactly one is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    FunctionCall(FunctionCall),
    Result(WireValue),
    Err(String),
    /// Source lines to parse and evaluate in the global context.
    Code(Code),
    /// Function catalog request (empty) or response.
    FunctionList(FunctionList),
    Console(ConsoleMessage),
}

/// Which side's object model a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallTarget {
    /// A named function in the script runtime or a host command.
    #[default]
    Script,
    /// A member of a host-owned foreign object.
    Foreign,
}

/// A call to a named function.
///
/// For script targets `function` may be qualified with `$` separators
/// (`"pkg$sub$fn"`). For foreign targets `index`, `handle` and `call_kind`
/// address the member.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionCall {
    pub target: CallTarget,
    pub function: String,
    pub index: u32,
    #[serde(rename = "pointer", with = "crate::json::uint64")]
    pub handle: u64,
    #[serde(rename = "type")]
    pub call_kind: CallKind,
    pub arguments: Vec<WireValue>,
}

impl FunctionCall {
    /// A script-target call with positional arguments.
    pub fn script(function: impl Into<String>, arguments: Vec<WireValue>) -> Self {
        Self {
            function: function.into(),
            arguments,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Code {
    #[serde(rename = "line")]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionList {
    pub functions: Vec<FunctionDescriptor>,
}

/// Console-channel traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleMessage {
    /// Command history pushed from the runtime.
    History(WireValue),
}

impl CallEnvelope {
    pub fn new(id: u32, wait: bool, operation: Operation) -> Self {
        Self {
            id,
            wait,
            operation,
        }
    }

    pub fn call(id: u32, wait: bool, call: FunctionCall) -> Self {
        Self::new(id, wait, Operation::FunctionCall(call))
    }

    pub fn result(id: u32, value: WireValue) -> Self {
        Self::new(id, false, Operation::Result(value))
    }

    pub fn error(id: u32, message: impl Into<String>) -> Self {
        Self::new(id, false, Operation::Err(message.into()))
    }

    pub fn code(id: u32, wait: bool, lines: Vec<String>) -> Self {
        Self::new(id, wait, Operation::Code(Code { lines }))
    }

    pub fn function_call(&self) -> Option<&FunctionCall> {
        match &self.operation {
            Operation::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn result_value(&self) -> Option<&WireValue> {
        match &self.operation {
            Operation::Result(value) => Some(value),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.operation {
            Operation::Err(message) => Some(message),
            _ => None,
        }
    }

    /// The wire name of the populated operation.
    pub fn operation_name(&self) -> &'static str {
        match self.operation {
            Operation::FunctionCall(_) => "functionCall",
            Operation::Result(_) => "result",
            Operation::Err(_) => "err",
            Operation::Code(_) => "code",
            Operation::FunctionList(_) => "functionList",
            Operation::Console(_) => "console",
        }
    }
}
