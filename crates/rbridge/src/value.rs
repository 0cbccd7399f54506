//! Script runtime value model.
//!
//! `RValue` mirrors the runtime's native object shapes closely enough for
//! marshalling: atomic vectors with NA-able elements, generic lists,
//! environments, external pointers and S4 objects, each vector carrying an
//! ordered attribute list. Attributes are stored as-is, so malformed ones
//! (non-character names, non-list dimnames) can be represented and tolerated
//! by the encoder.

use std::fmt;

pub use rbridge_protocol::Complex;

use crate::handle::ExternalPtr;

/// Well-known attribute names.
pub mod attr {
    pub const NAMES: &str = "names";
    pub const DIM: &str = "dim";
    pub const DIMNAMES: &str = "dimnames";
    pub const LEVELS: &str = "levels";
    pub const CLASS: &str = "class";
    pub const ROW_NAMES: &str = "row.names";
}

/// Slots of the cell-range S4 class.
pub mod slot {
    pub const R1: &str = "R1";
    pub const C1: &str = "C1";
    pub const R2: &str = "R2";
    pub const C2: &str = "C2";
    pub const SHEET_ID: &str = "SheetID";
}

/// A character vector element: raw bytes as held by the runtime, which are
/// not guaranteed to be valid UTF-8.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct RString(Vec<u8>);

impl RString {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        RString(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{s:?}"),
            None => write!(f, "b{:?}", String::from_utf8_lossy(&self.0)),
        }
    }
}

impl From<&str> for RString {
    fn from(s: &str) -> Self {
        RString(s.as_bytes().to_vec())
    }
}

impl From<String> for RString {
    fn from(s: String) -> Self {
        RString(s.into_bytes())
    }
}

/// Opaque environment identifier, assigned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u64);

/// A value in the script runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RValue {
    #[default]
    Null,
    /// The symbolic marker for an argument that was not supplied.
    MissingArg,
    Vector(Vector),
    Environment(EnvId),
    ExternalPtr(ExternalPtr),
    S4(S4Object),
}

/// A vector with attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub data: VectorData,
    pub attributes: Attributes,
}

/// Vector payloads. `None` elements are NA.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Logical(Vec<Option<bool>>),
    Integer(Vec<Option<i32>>),
    Real(Vec<Option<f64>>),
    Complex(Vec<Option<Complex>>),
    Character(Vec<Option<RString>>),
    List(Vec<RValue>),
}

impl VectorData {
    pub fn len(&self) -> usize {
        match self {
            VectorData::Logical(v) => v.len(),
            VectorData::Integer(v) => v.len(),
            VectorData::Real(v) => v.len(),
            VectorData::Complex(v) => v.len(),
            VectorData::Character(v) => v.len(),
            VectorData::List(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            VectorData::Logical(_) => "logical",
            VectorData::Integer(_) => "integer",
            VectorData::Real(_) => "double",
            VectorData::Complex(_) => "complex",
            VectorData::Character(_) => "character",
            VectorData::List(_) => "list",
        }
    }
}

/// Ordered attribute list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes(Vec<(String, RValue)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&RValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set an attribute, replacing an existing one of the same name.
    /// Setting `Null` removes it.
    pub fn set(&mut self, name: &str, value: RValue) {
        if value.is_null() {
            self.0.retain(|(n, _)| n != name);
            return;
        }
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An S4 object: a class name and named slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct S4Object {
    pub class: String,
    slots: Vec<(String, RValue)>,
}

impl S4Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            slots: Vec::new(),
        }
    }

    pub fn slot(&self, name: &str) -> Option<&RValue> {
        self.slots.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn set_slot(&mut self, name: &str, value: RValue) {
        match self.slots.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.slots.push((name.to_string(), value)),
        }
    }
}

impl RValue {
    pub fn vector(data: VectorData) -> Self {
        RValue::Vector(Vector {
            data,
            attributes: Attributes::default(),
        })
    }

    pub fn logical(b: bool) -> Self {
        Self::vector(VectorData::Logical(vec![Some(b)]))
    }

    pub fn integer(n: i32) -> Self {
        Self::vector(VectorData::Integer(vec![Some(n)]))
    }

    pub fn real(n: f64) -> Self {
        Self::vector(VectorData::Real(vec![Some(n)]))
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self::vector(VectorData::Complex(vec![Some(Complex { re, im })]))
    }

    pub fn string(s: impl Into<RString>) -> Self {
        Self::vector(VectorData::Character(vec![Some(s.into())]))
    }

    /// The integer NA scalar.
    pub fn na_integer() -> Self {
        Self::vector(VectorData::Integer(vec![None]))
    }

    pub fn logicals(values: impl IntoIterator<Item = bool>) -> Self {
        Self::vector(VectorData::Logical(values.into_iter().map(Some).collect()))
    }

    pub fn integers(values: impl IntoIterator<Item = i32>) -> Self {
        Self::vector(VectorData::Integer(values.into_iter().map(Some).collect()))
    }

    pub fn reals(values: impl IntoIterator<Item = f64>) -> Self {
        Self::vector(VectorData::Real(values.into_iter().map(Some).collect()))
    }

    pub fn strings<S: Into<RString>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::vector(VectorData::Character(
            values.into_iter().map(|s| Some(s.into())).collect(),
        ))
    }

    pub fn list(values: Vec<RValue>) -> Self {
        Self::vector(VectorData::List(values))
    }

    /// A list with a names attribute.
    pub fn named_list<S: Into<String>>(entries: Vec<(S, RValue)>) -> Self {
        let (names, values): (Vec<String>, Vec<RValue>) =
            entries.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self::list(values).with_names(names)
    }

    /// A factor: integer codes into `levels`, 1-based.
    pub fn factor<S: Into<RString>>(
        codes: Vec<Option<i32>>,
        levels: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::vector(VectorData::Integer(codes))
            .with_attr(attr::LEVELS, Self::strings(levels))
            .with_attr(attr::CLASS, Self::string("factor"))
    }

    /// A column-major matrix.
    pub fn matrix(data: VectorData, rows: usize, cols: usize) -> Self {
        Self::vector(data).with_dim(rows, cols)
    }

    /// A data frame from named columns. Row names are stored in the compact
    /// integer form the runtime uses for automatic row names.
    pub fn data_frame<S: Into<String>>(columns: Vec<(S, RValue)>) -> Self {
        let rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        Self::named_list(columns)
            .with_attr(attr::CLASS, Self::string("data.frame"))
            .with_attr(
                attr::ROW_NAMES,
                Self::vector(VectorData::Integer(vec![None, Some(-(rows as i32))])),
            )
    }

    /// Set an attribute. No-op on non-vector values.
    pub fn with_attr(mut self, name: &str, value: RValue) -> Self {
        if let RValue::Vector(v) = &mut self {
            v.attributes.set(name, value);
        }
        self
    }

    pub fn with_names<S: Into<RString>>(self, names: impl IntoIterator<Item = S>) -> Self {
        self.with_attr(attr::NAMES, Self::strings(names))
    }

    pub fn with_dim(self, rows: usize, cols: usize) -> Self {
        self.with_attr(attr::DIM, Self::integers([rows as i32, cols as i32]))
    }

    // ------------------------------------------------------------------
    // Probes
    // ------------------------------------------------------------------

    pub fn is_null(&self) -> bool {
        matches!(self, RValue::Null)
    }

    /// Element count, as the runtime's `length()` reports it.
    pub fn len(&self) -> usize {
        match self {
            RValue::Null => 0,
            RValue::Vector(v) => v.data.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            RValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&VectorData> {
        self.as_vector().map(|v| &v.data)
    }

    pub fn attr(&self, name: &str) -> Option<&RValue> {
        self.as_vector().and_then(|v| v.attributes.get(name))
    }

    /// Whether the class attribute contains `class`.
    pub fn inherits(&self, class: &str) -> bool {
        match self.attr(attr::CLASS).and_then(RValue::as_character) {
            Some(classes) => classes
                .iter()
                .flatten()
                .any(|c| c.as_bytes() == class.as_bytes()),
            None => false,
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.data(), Some(VectorData::Logical(_)))
    }

    pub fn is_factor(&self) -> bool {
        matches!(self.data(), Some(VectorData::Integer(_))) && self.inherits("factor")
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.data(), Some(VectorData::Integer(_))) && !self.inherits("factor")
    }

    pub fn is_real(&self) -> bool {
        matches!(self.data(), Some(VectorData::Real(_)))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.data(), Some(VectorData::Character(_)))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.data(), Some(VectorData::List(_)))
    }

    /// A non-list vector.
    pub fn is_atomic(&self) -> bool {
        self.data().is_some() && !self.is_list()
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, RValue::Environment(_))
    }

    /// A data frame whose columns are all atomic vectors.
    pub fn is_frame(&self) -> bool {
        match self.data() {
            Some(VectorData::List(columns)) => {
                self.inherits("data.frame") && columns.iter().all(RValue::is_atomic)
            }
            _ => false,
        }
    }

    /// `(rows, cols)` from a two-element `dim` attribute.
    pub fn dim(&self) -> Option<(usize, usize)> {
        let dims: Vec<usize> = match self.attr(attr::DIM)?.data()? {
            VectorData::Integer(d) => d
                .iter()
                .map(|n| n.and_then(|n| usize::try_from(n).ok()))
                .collect::<Option<_>>()?,
            VectorData::Real(d) => d
                .iter()
                .map(|n| n.filter(|n| n.is_finite() && *n >= 0.0).map(|n| n as usize))
                .collect::<Option<_>>()?,
            _ => return None,
        };
        match dims.as_slice() {
            [rows, cols] => Some((*rows, *cols)),
            _ => None,
        }
    }

    pub fn is_matrix(&self) -> bool {
        self.dim().is_some()
    }

    pub fn as_character(&self) -> Option<&[Option<RString>]> {
        match self.data()? {
            VectorData::Character(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RValue]> {
        match self.data()? {
            VectorData::List(v) => Some(v),
            _ => None,
        }
    }

    /// The first element of a character vector, as UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_character()?.first()?.as_ref()?.as_str()
    }

    /// The first element of an integer vector.
    pub fn as_integer(&self) -> Option<i32> {
        match self.data()? {
            VectorData::Integer(v) => *v.first()?,
            _ => None,
        }
    }

    /// The first element of a numeric vector, widened to f64.
    pub fn as_real(&self) -> Option<f64> {
        match self.data()? {
            VectorData::Real(v) => *v.first()?,
            VectorData::Integer(v) => v.first()?.map(f64::from),
            _ => None,
        }
    }

    pub fn as_external_ptr(&self) -> Option<&ExternalPtr> {
        match self {
            RValue::ExternalPtr(p) => Some(p),
            _ => None,
        }
    }

    /// Names attribute as strings, if it is a character vector.
    /// NA names read as empty.
    pub fn names(&self) -> Option<Vec<String>> {
        let names = self.attr(attr::NAMES)?.as_character()?;
        Some(
            names
                .iter()
                .map(|n| {
                    n.as_ref()
                        .map(|n| String::from_utf8_lossy(n.as_bytes()).into_owned())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }

    /// Look up a list element by name.
    pub fn get(&self, name: &str) -> Option<&RValue> {
        let names = self.names()?;
        let index = names.iter().position(|n| n == name)?;
        self.as_list()?.get(index)
    }
}

impl From<Vector> for RValue {
    fn from(v: Vector) -> Self {
        RValue::Vector(v)
    }
}
