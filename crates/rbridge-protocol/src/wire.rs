//! The wire value: a tagged union exchanged between the script runtime and
//! the spreadsheet host.
//!
//! On the wire a value is a JSON object with at most one variant field
//! (`str`, `integer`, `arr`, ...) plus an optional `name`. An object with no
//! variant field is read as `Nil`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::json::Double;

/// A value crossing the runtime/host boundary.
///
/// `name` is only meaningful when the value is an element of a named
/// collection; it is empty otherwise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawWireValue", into = "RawWireValue")]
pub struct WireValue {
    pub name: String,
    pub value: Value,
}

/// The populated variant of a [`WireValue`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    /// An argument slot left intentionally empty.
    Missing,
    Str(String),
    Integer(i32),
    Real(f64),
    Boolean(bool),
    Complex(Complex),
    Range(RangeRef),
    Array(Array),
    ForeignObject(ForeignObjectRef),
    Error(ErrorValue),
}

/// A complex number.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    #[serde(rename = "r", with = "crate::json::double")]
    pub re: f64,
    #[serde(rename = "i", with = "crate::json::double")]
    pub im: f64,
}

/// A rectangular cell range on one sheet. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeRef {
    pub start_row: u32,
    pub start_column: u32,
    pub end_row: u32,
    pub end_column: u32,
    #[serde(with = "crate::json::uint64")]
    pub sheet_id: u64,
}

impl RangeRef {
    /// Split the sheet id into (high, low) 32-bit halves.
    ///
    /// The script runtime has no 64-bit integer type, so the id travels into
    /// it as two signed 32-bit integers carrying the raw bits.
    pub fn sheet_id_halves(&self) -> (i32, i32) {
        ((self.sheet_id >> 32) as u32 as i32, self.sheet_id as u32 as i32)
    }

    /// Rebuild a sheet id from the halves produced by [`Self::sheet_id_halves`].
    pub fn sheet_id_from_halves(high: i32, low: i32) -> u64 {
        ((high as u32 as u64) << 32) | (low as u32 as u64)
    }
}

/// A sequence or matrix of values.
///
/// `rows`/`cols` describe a column-major matrix when their product equals
/// `data.len()`. `cols == 0` means a flat sequence. Use [`Array::shape`]
/// rather than reading the fields directly: it applies the recovery rule for
/// inconsistent shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Array {
    pub rows: u32,
    pub cols: u32,
    pub data: Vec<WireValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rownames: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub colnames: Vec<String>,
}

impl Array {
    /// A flat sequence.
    pub fn flat(data: Vec<WireValue>) -> Self {
        Self {
            rows: data.len() as u32,
            cols: 0,
            data,
            ..Self::default()
        }
    }

    /// A column-major matrix. The shape is not checked here; see [`Array::shape`].
    pub fn matrix(rows: u32, cols: u32, data: Vec<WireValue>) -> Self {
        Self {
            rows,
            cols,
            data,
            ..Self::default()
        }
    }

    /// The effective `(rows, cols)` of this array.
    ///
    /// When the declared shape is empty or does not account for every
    /// element, the array is read as a flat sequence: `(data.len(), 0)`.
    pub fn shape(&self) -> (usize, usize) {
        let count = self.rows as u64 * self.cols as u64;
        let len = self.data.len();
        if count == 0 || count != len as u64 {
            (len, 0)
        } else {
            (self.rows as usize, self.cols as usize)
        }
    }

    /// Whether this array reads as a matrix (see [`Array::shape`]).
    pub fn is_matrix(&self) -> bool {
        self.shape().1 != 0
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether any element carries a name.
    pub fn has_names(&self) -> bool {
        self.data.iter().any(|v| !v.name.is_empty())
    }

    /// Look up an element by name (first match).
    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.data.iter().find(|v| v.name == name)
    }
}

/// How a foreign member is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    #[default]
    Method,
    Get,
    Put,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Method => "method",
            CallKind::Get => "get",
            CallKind::Put => "put",
        }
    }

    /// Parse the runtime-side spelling. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<CallKind> {
        match s {
            "method" => Some(CallKind::Method),
            "get" => Some(CallKind::Get),
            "put" => Some(CallKind::Put),
            _ => None,
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named argument slot, optionally with a default value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArgumentDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<WireValue>,
}

impl ArgumentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }
}

/// A callable member of a foreign object, or an entry in a function catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionDescriptor {
    pub name: String,
    pub index: u32,
    #[serde(rename = "callType")]
    pub call_kind: CallKind,
    pub arguments: Vec<ArgumentDescriptor>,
}

/// One member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumValue {
    pub name: String,
    pub value: i32,
}

/// A named enumeration exposed by a foreign object's type library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumDescriptor {
    pub name: String,
    pub values: Vec<EnumValue>,
}

/// A reference to an object owned by the host.
///
/// When the host exposes an object the reflective tables are populated; when
/// a reference is merely passed back to the host only `handle` is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForeignObjectRef {
    pub interface_name: String,
    #[serde(rename = "pointer", with = "crate::json::uint64")]
    pub handle: u64,
    pub functions: Vec<FunctionDescriptor>,
    pub enums: Vec<EnumDescriptor>,
}

impl ForeignObjectRef {
    /// A bare reference carrying only the handle.
    pub fn handle_only(handle: u64) -> Self {
        Self {
            handle,
            ..Self::default()
        }
    }
}

/// Spreadsheet error codes plus the NA marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorKind {
    #[default]
    Generic,
    /// A typed missing value, not a failure.
    Na,
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
}

/// An error cell value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorValue {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl WireValue {
    pub fn new(value: Value) -> Self {
        Self {
            name: String::new(),
            value,
        }
    }

    pub fn nil() -> Self {
        Self::new(Value::Nil)
    }

    pub fn missing() -> Self {
        Self::new(Value::Missing)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Value::Str(s.into()))
    }

    pub fn integer(n: i32) -> Self {
        Self::new(Value::Integer(n))
    }

    pub fn real(n: f64) -> Self {
        Self::new(Value::Real(n))
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(Value::Boolean(b))
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self::new(Value::Complex(Complex { re, im }))
    }

    pub fn range(range: RangeRef) -> Self {
        Self::new(Value::Range(range))
    }

    pub fn array(array: Array) -> Self {
        Self::new(Value::Array(array))
    }

    pub fn foreign(object: ForeignObjectRef) -> Self {
        Self::new(Value::ForeignObject(object))
    }

    pub fn error(kind: ErrorKind) -> Self {
        Self::new(Value::Error(ErrorValue {
            kind,
            message: String::new(),
        }))
    }

    /// The typed missing-value marker.
    pub fn na() -> Self {
        Self::error(ErrorKind::Na)
    }

    /// Attach an element name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.value, Value::Nil)
    }

    pub fn is_na(&self) -> bool {
        matches!(
            self.value,
            Value::Error(ErrorValue {
                kind: ErrorKind::Na,
                ..
            })
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self.value {
            Value::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self.value {
            Value::Real(n) => Some(n),
            Value::Integer(n) => Some(n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match &self.value {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_foreign_object(&self) -> Option<&ForeignObjectRef> {
        match &self.value {
            Value::ForeignObject(o) => Some(o),
            _ => None,
        }
    }

    /// Short variant label, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        self.value.kind_name()
    }
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Missing => "missing",
            Value::Str(_) => "str",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::Complex(_) => "cpx",
            Value::Range(_) => "ref",
            Value::Array(_) => "arr",
            Value::ForeignObject(_) => "comPointer",
            Value::Error(_) => "err",
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        WireValue::new(value)
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::string(s)
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        WireValue::string(s)
    }
}

impl From<i32> for WireValue {
    fn from(n: i32) -> Self {
        WireValue::integer(n)
    }
}

impl From<f64> for WireValue {
    fn from(n: f64) -> Self {
        WireValue::real(n)
    }
}

impl From<bool> for WireValue {
    fn from(b: bool) -> Self {
        WireValue::boolean(b)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            write!(f, "{}=", self.name)?;
        }
        match &self.value {
            Value::Nil => write!(f, "nil"),
            Value::Missing => write!(f, "<missing>"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Integer(n) => write!(f, "{n}L"),
            Value::Real(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Complex(c) => write!(f, "{}{:+}i", c.re, c.im),
            Value::Range(r) => write!(
                f,
                "ref[R{}C{}:R{}C{} sheet {:#x}]",
                r.start_row, r.start_column, r.end_row, r.end_column, r.sheet_id
            ),
            Value::Array(a) => match a.shape() {
                (rows, 0) => write!(f, "arr[{rows}]"),
                (rows, cols) => write!(f, "arr[{rows}x{cols}]"),
            },
            Value::ForeignObject(o) => write!(
                f,
                "comPointer[{} @ {:#x}, {} functions, {} enums]",
                if o.interface_name.is_empty() { "?" } else { &o.interface_name },
                o.handle,
                o.functions.len(),
                o.enums.len()
            ),
            Value::Error(e) if e.message.is_empty() => write!(f, "#{:?}", e.kind),
            Value::Error(e) => write!(f, "#{:?}({})", e.kind, e.message),
        }
    }
}

// ============================================================================
// Wire representation
// ============================================================================

/// Serialized form: one optional field per variant.
#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWireValue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nil: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    missing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    integer: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    real: Option<Double>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cpx: Option<Complex>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    range: Option<RangeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arr: Option<Array>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    com_pointer: Option<ForeignObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    err: Option<ErrorValue>,
}

impl From<RawWireValue> for WireValue {
    fn from(raw: RawWireValue) -> Self {
        let mut candidates = [
            raw.nil.map(|_| Value::Nil),
            raw.missing.map(|_| Value::Missing),
            raw.str.map(Value::Str),
            raw.integer.map(Value::Integer),
            raw.real.map(|n| Value::Real(n.0)),
            raw.boolean.map(Value::Boolean),
            raw.cpx.map(Value::Complex),
            raw.range.map(Value::Range),
            raw.arr.map(Value::Array),
            raw.com_pointer.map(Value::ForeignObject),
            raw.err.map(Value::Error),
        ]
        .into_iter()
        .flatten();

        let value = candidates.next().unwrap_or_default();
        let extra = candidates.count();
        if extra > 0 {
            tracing::warn!(
                "wire value carries {} variant fields, keeping {}",
                extra + 1,
                value.kind_name()
            );
        }

        WireValue {
            name: raw.name,
            value,
        }
    }
}

impl From<WireValue> for RawWireValue {
    fn from(wire: WireValue) -> Self {
        let mut raw = RawWireValue {
            name: wire.name,
            ..RawWireValue::default()
        };
        match wire.value {
            Value::Nil => raw.nil = Some(true),
            Value::Missing => raw.missing = Some(true),
            Value::Str(s) => raw.str = Some(s),
            Value::Integer(n) => raw.integer = Some(n),
            Value::Real(n) => raw.real = Some(Double(n)),
            Value::Boolean(b) => raw.boolean = Some(b),
            Value::Complex(c) => raw.cpx = Some(c),
            Value::Range(r) => raw.range = Some(r),
            Value::Array(a) => raw.arr = Some(a),
            Value::ForeignObject(o) => raw.com_pointer = Some(o),
            Value::Error(e) => raw.err = Some(e),
        }
        raw
    }
}
