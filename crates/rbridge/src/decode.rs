//! Wire value to runtime value.

use std::rc::Rc;

use rbridge_protocol::{Array, ErrorKind, ForeignObjectRef, RangeRef, Value, WireValue};

use crate::config::BridgeConfig;
use crate::descriptor::describe;
use crate::handle::{ExternalPtr, ForeignHandle, ReleaseHook};
use crate::runtime::ObjectFactory;
use crate::value::{attr, slot, RValue, VectorData};

/// Vector type chosen for a decoded array after one scan over its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayKind {
    Integer,
    Real,
    Logical,
    Complex,
    Character,
    Mixed,
}

/// Element classes seen while scanning an array.
#[derive(Debug, Default)]
struct Scan {
    integer: bool,
    real: bool,
    logical: bool,
    complex: bool,
    character: bool,
    other: bool,
}

impl Scan {
    fn of(data: &[WireValue]) -> Self {
        let mut scan = Scan::default();
        for element in data {
            match &element.value {
                Value::Integer(_) => scan.integer = true,
                Value::Real(_) => scan.real = true,
                Value::Boolean(_) => scan.logical = true,
                Value::Complex(_) => scan.complex = true,
                Value::Str(_) => scan.character = true,
                // NA fits any vector type.
                _ if element.is_na() => {}
                _ => scan.other = true,
            }
        }
        scan
    }

    fn kind(&self) -> ArrayKind {
        let numeric = self.integer || self.real;
        let families = [numeric, self.logical, self.complex, self.character]
            .iter()
            .filter(|seen| **seen)
            .count();
        if self.other || families > 1 {
            return ArrayKind::Mixed;
        }
        if self.real {
            ArrayKind::Real
        } else if self.logical {
            ArrayKind::Logical
        } else if self.complex {
            ArrayKind::Complex
        } else if self.character {
            ArrayKind::Character
        } else {
            // Integers, or nothing but NA.
            ArrayKind::Integer
        }
    }
}

/// Converts wire values into runtime values.
///
/// Foreign objects are wrapped in external pointers that call the release
/// hook, if one is set, when the runtime drops its last copy.
pub struct Decoder<'a> {
    objects: &'a dyn ObjectFactory,
    release: Option<Rc<dyn ReleaseHook>>,
    range_class: String,
}

impl<'a> Decoder<'a> {
    pub fn new(objects: &'a dyn ObjectFactory, config: &BridgeConfig) -> Self {
        Self {
            objects,
            release: None,
            range_class: config.range_class.clone(),
        }
    }

    /// Release foreign handles through `hook`.
    pub fn with_release(mut self, hook: Rc<dyn ReleaseHook>) -> Self {
        self.release = Some(hook);
        self
    }

    pub fn decode(&self, wire: &WireValue) -> RValue {
        match &wire.value {
            Value::Nil | Value::Missing => RValue::Null,
            Value::Str(s) => RValue::string(s.as_str()),
            Value::Integer(n) => RValue::integer(*n),
            Value::Real(n) => RValue::real(*n),
            Value::Boolean(b) => RValue::logical(*b),
            Value::Complex(c) => RValue::complex(c.re, c.im),
            Value::Error(e) if e.kind == ErrorKind::Na => RValue::na_integer(),
            Value::Error(e) => {
                tracing::debug!("error value {:?} has no runtime form, decoding as NULL", e.kind);
                RValue::Null
            }
            Value::Range(range) => self.decode_range(range),
            Value::Array(array) => self.decode_array(array),
            Value::ForeignObject(object) => self.decode_foreign(object),
        }
    }

    fn decode_range(&self, range: &RangeRef) -> RValue {
        let mut object = match self.objects.new_object(&self.range_class) {
            Some(object) => object,
            None => {
                tracing::warn!("class {} is not defined, range decodes as NULL", self.range_class);
                return RValue::Null;
            }
        };
        let (high, low) = range.sheet_id_halves();
        object.set_slot(slot::R1, RValue::integer(range.start_row as i32));
        object.set_slot(slot::C1, RValue::integer(range.start_column as i32));
        object.set_slot(slot::R2, RValue::integer(range.end_row as i32));
        object.set_slot(slot::C2, RValue::integer(range.end_column as i32));
        object.set_slot(
            slot::SHEET_ID,
            RValue::list(vec![RValue::integer(high), RValue::integer(low)]),
        );
        RValue::S4(object)
    }

    fn decode_foreign(&self, object: &ForeignObjectRef) -> RValue {
        let handle = match &self.release {
            Some(hook) => ForeignHandle::with_release(object.handle, hook.clone()),
            None => ForeignHandle::borrowed(object.handle),
        };
        tracing::trace!(
            "wrapping foreign object {} @ {:#x}",
            object.interface_name,
            object.handle
        );
        describe(object, ExternalPtr::new(handle))
    }

    fn decode_array(&self, array: &Array) -> RValue {
        let (rows, cols) = array.shape();
        let data = &array.data;
        if data.is_empty() {
            return RValue::list(Vec::new());
        }

        let kind = Scan::of(data).kind();
        tracing::debug!("decoding {} element array as {:?}", data.len(), kind);

        let vector = match kind {
            ArrayKind::Integer => VectorData::Integer(data.iter().map(|v| v.as_integer()).collect()),
            ArrayKind::Real => VectorData::Real(data.iter().map(|v| v.as_real()).collect()),
            ArrayKind::Logical => VectorData::Logical(data.iter().map(|v| v.as_bool()).collect()),
            ArrayKind::Complex => VectorData::Complex(
                data.iter()
                    .map(|v| match v.value {
                        Value::Complex(c) => Some(c),
                        _ => None,
                    })
                    .collect(),
            ),
            ArrayKind::Character => VectorData::Character(
                data.iter().map(|v| v.as_str().map(Into::into)).collect(),
            ),
            ArrayKind::Mixed => VectorData::List(data.iter().map(|v| self.decode(v)).collect()),
        };

        let mut value = RValue::vector(vector);
        if cols != 0 {
            value = value.with_dim(rows, cols);
            if let Some(dimnames) = dimnames(array, rows, cols) {
                value = value.with_attr(attr::DIMNAMES, dimnames);
            }
        }
        if array.has_names() {
            value = value.with_names(data.iter().map(|v| v.name.as_str()));
        }
        value
    }
}

/// `list(rownames, colnames)` for a matrix, when the name vectors fit.
fn dimnames(array: &Array, rows: usize, cols: usize) -> Option<RValue> {
    if array.rownames.is_empty() && array.colnames.is_empty() {
        return None;
    }
    let part = |names: &[String], expected: usize, what: &str| -> Option<RValue> {
        if names.is_empty() {
            Some(RValue::Null)
        } else if names.len() == expected {
            Some(RValue::strings(names.iter().map(String::as_str)))
        } else {
            tracing::debug!(
                "ignoring {} {}: expected {}",
                names.len(),
                what,
                expected
            );
            None
        }
    };
    let rownames = part(&array.rownames, rows, "row names")?;
    let colnames = part(&array.colnames, cols, "column names")?;
    Some(RValue::list(vec![rownames, colnames]))
}
