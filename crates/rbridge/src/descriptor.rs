//! Foreign object descriptors.
//!
//! A foreign object reaches script code as a plain named list:
//!
//! ```text
//! list(
//!   interface = "Range",
//!   pointer   = <external pointer>,
//!   functions = list(get_Value = list(name=, index=, call.type=, arguments=), ...),
//!   enums     = list(XlDirection = c(xlDown = -4121L, ...), ...)
//! )
//! ```
//!
//! Function entries are keyed by [`function_key`], so a property getter and
//! setter sharing a member name never collide.

use rbridge_protocol::{
    ArgumentDescriptor, CallKind, EnumDescriptor, EnumValue, ForeignObjectRef, FunctionDescriptor,
};

use crate::handle::ExternalPtr;
use crate::value::{RString, RValue};

/// Element names of a descriptor list.
pub mod field {
    pub const INTERFACE: &str = "interface";
    pub const POINTER: &str = "pointer";
    pub const FUNCTIONS: &str = "functions";
    pub const ENUMS: &str = "enums";

    pub const NAME: &str = "name";
    pub const INDEX: &str = "index";
    pub const CALL_TYPE: &str = "call.type";
    pub const ARGUMENTS: &str = "arguments";
}

/// The key a member is published under: accessors are prefixed with their
/// kind (`get_Value`, `put_Value`), methods keep their name.
pub fn function_key(function: &FunctionDescriptor) -> String {
    match function.call_kind {
        CallKind::Method => function.name.clone(),
        kind => format!("{}_{}", kind.as_str(), function.name),
    }
}

/// Build the script-side descriptor for a foreign object. `pointer` is the
/// wrapper that carries the release obligation for `object.handle`.
pub fn describe(object: &ForeignObjectRef, pointer: ExternalPtr) -> RValue {
    let functions: Vec<(String, RValue)> = object
        .functions
        .iter()
        .map(|f| (function_key(f), describe_function(f)))
        .collect();

    let enums: Vec<(String, RValue)> = object
        .enums
        .iter()
        .map(|e| {
            let values = RValue::integers(e.values.iter().map(|v| v.value))
                .with_names(e.values.iter().map(|v| v.name.as_str()));
            (e.name.clone(), values)
        })
        .collect();

    RValue::named_list(vec![
        (field::INTERFACE, RValue::string(object.interface_name.as_str())),
        (field::POINTER, RValue::ExternalPtr(pointer)),
        (field::FUNCTIONS, RValue::named_list(functions)),
        (field::ENUMS, RValue::named_list(enums)),
    ])
}

fn describe_function(function: &FunctionDescriptor) -> RValue {
    // Argument names only; defaults are not exposed to script code.
    let arguments: Vec<RString> = function
        .arguments
        .iter()
        .map(|a| RString::from(a.name.as_str()))
        .collect();

    RValue::named_list(vec![
        (field::NAME, RValue::string(function.name.as_str())),
        (field::INDEX, RValue::integer(function.index as i32)),
        (field::CALL_TYPE, RValue::string(function.call_kind.as_str())),
        (field::ARGUMENTS, RValue::strings(arguments)),
    ])
}

/// The foreign handle held by a value: either a bare external pointer or a
/// descriptor list built by [`describe`].
pub fn handle_of(value: &RValue) -> Option<u64> {
    match value {
        RValue::ExternalPtr(p) => Some(p.address()),
        _ => value
            .get(field::POINTER)
            .and_then(RValue::as_external_ptr)
            .map(ExternalPtr::address),
    }
}

/// Host-side builder for the reflective description of a foreign object.
#[derive(Debug, Clone, Default)]
pub struct ForeignObjectBuilder {
    object: ForeignObjectRef,
}

impl ForeignObjectBuilder {
    pub fn new(interface_name: impl Into<String>, handle: u64) -> Self {
        Self {
            object: ForeignObjectRef {
                interface_name: interface_name.into(),
                handle,
                ..ForeignObjectRef::default()
            },
        }
    }

    /// Add a member of any kind.
    pub fn function(
        mut self,
        name: impl Into<String>,
        index: u32,
        call_kind: CallKind,
        arguments: &[&str],
    ) -> Self {
        self.object.functions.push(FunctionDescriptor {
            name: name.into(),
            index,
            call_kind,
            arguments: arguments.iter().map(|a| ArgumentDescriptor::new(*a)).collect(),
        });
        self
    }

    pub fn method(self, name: impl Into<String>, index: u32, arguments: &[&str]) -> Self {
        self.function(name, index, CallKind::Method, arguments)
    }

    pub fn property_get(self, name: impl Into<String>, index: u32) -> Self {
        self.function(name, index, CallKind::Get, &[])
    }

    pub fn property_put(self, name: impl Into<String>, index: u32) -> Self {
        self.function(name, index, CallKind::Put, &["value"])
    }

    pub fn enumeration<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = (S, i32)>,
    ) -> Self {
        self.object.enums.push(EnumDescriptor {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(name, value)| EnumValue {
                    name: name.into(),
                    value,
                })
                .collect(),
        });
        self
    }

    pub fn build(self) -> ForeignObjectRef {
        self.object
    }
}
