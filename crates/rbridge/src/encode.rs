//! Runtime value to wire value.

use rbridge_protocol::{Array, ForeignObjectRef, RangeRef, Value, WireValue};

use crate::codepage::{to_utf8, CodePage};
use crate::config::BridgeConfig;
use crate::value::{attr, slot, RString, RValue, S4Object, VectorData};

/// Element kind chosen for a whole atomic vector. Classification happens once
/// per vector so the encoded elements are always homogeneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorKind {
    Logical,
    Factor,
    Integer,
    Real,
    Complex,
    Character,
}

/// Priority order: the first matching probe decides.
const CLASSIFIERS: &[(VectorKind, fn(&RValue) -> bool)] = &[
    (VectorKind::Logical, RValue::is_logical),
    (VectorKind::Factor, RValue::is_factor),
    (VectorKind::Integer, RValue::is_integer),
    (VectorKind::Real, RValue::is_real),
    (VectorKind::Complex, is_complex),
    (VectorKind::Character, RValue::is_string),
];

fn is_complex(value: &RValue) -> bool {
    matches!(value.data(), Some(VectorData::Complex(_)))
}

fn classify(value: &RValue) -> Option<VectorKind> {
    CLASSIFIERS
        .iter()
        .find(|(_, probe)| probe(value))
        .map(|(kind, _)| *kind)
}

/// Converts runtime values into wire values.
///
/// Encoding never fails: unsupported or malformed input degrades to `Nil` or
/// drops the offending attribute, with a diagnostic.
#[derive(Debug, Clone)]
pub struct Encoder {
    code_page: CodePage,
    range_class: String,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(&BridgeConfig::default())
    }
}

impl Encoder {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            code_page: config.legacy_code_page,
            range_class: config.range_class.clone(),
        }
    }

    pub fn encode(&self, value: &RValue) -> WireValue {
        match value {
            RValue::Null => WireValue::nil(),
            RValue::MissingArg => WireValue::missing(),
            RValue::Vector(_) => self.encode_vector(value),
            RValue::ExternalPtr(p) => WireValue::foreign(ForeignObjectRef::handle_only(p.address())),
            RValue::S4(object) => self.encode_object(object),
            RValue::Environment(env) => {
                tracing::debug!("environment {:?} has no wire form, encoding as nil", env);
                WireValue::nil()
            }
        }
    }

    fn encode_vector(&self, value: &RValue) -> WireValue {
        let len = value.len();
        if len == 0 {
            return WireValue::nil();
        }
        if value.is_frame() {
            return self.encode_frame(value);
        }

        let (rows, cols) = match value.dim() {
            Some((rows, cols)) if rows.checked_mul(cols) == Some(len) => (rows, cols),
            Some((rows, cols)) => {
                tracing::debug!("dim {}x{} does not match length {}, encoding flat", rows, cols, len);
                (len, 0)
            }
            None => (len, 0),
        };

        let elements = match classify(value) {
            Some(kind) => self.encode_elements(kind, value),
            None => value
                .as_list()
                .unwrap_or_default()
                .iter()
                .map(|v| self.encode(v))
                .collect(),
        };

        if !value.is_list() && len == 1 {
            let mut scalar = elements.into_iter().next().unwrap_or_default();
            if let Some(name) = self.names(value).and_then(|n| n.into_iter().next()) {
                scalar.name = name;
            }
            return scalar;
        }

        let mut array = Array::matrix(rows as u32, cols as u32, elements);
        if let Some(names) = self.names(value) {
            for (element, name) in array.data.iter_mut().zip(names) {
                element.name = name;
            }
        }
        self.attach_dimnames(value, &mut array);
        WireValue::array(array)
    }

    /// Data frames: columns are flattened in column-major order.
    fn encode_frame(&self, frame: &RValue) -> WireValue {
        let columns = frame.as_list().unwrap_or_default();
        let rows = columns.first().map(RValue::len).unwrap_or(0);

        let mut data = Vec::with_capacity(rows * columns.len());
        for column in columns {
            match classify(column) {
                Some(kind) => data.extend(self.encode_elements(kind, column)),
                None => tracing::debug!("skipping non-atomic frame column"),
            }
        }

        let mut array = Array::matrix(rows as u32, columns.len() as u32, data);
        if let Some(names) = self.strings(frame.attr(attr::NAMES)) {
            array.colnames = names;
        }
        if let Some(names) = self.strings(frame.attr(attr::ROW_NAMES)) {
            array.rownames = names;
        }
        tracing::trace!("encoded frame {}x{}", rows, columns.len());
        WireValue::array(array)
    }

    fn encode_elements(&self, kind: VectorKind, value: &RValue) -> Vec<WireValue> {
        let data = match value.data() {
            Some(data) => data,
            None => return Vec::new(),
        };
        match (kind, data) {
            (VectorKind::Logical, VectorData::Logical(v)) => {
                v.iter().map(|b| na_or(*b, WireValue::boolean)).collect()
            }
            (VectorKind::Factor, VectorData::Integer(codes)) => {
                let levels = self.strings(value.attr(attr::LEVELS)).unwrap_or_default();
                codes
                    .iter()
                    .map(|code| na_or(*code, |code| factor_level(code, &levels)))
                    .collect()
            }
            (VectorKind::Integer, VectorData::Integer(v)) => {
                v.iter().map(|n| na_or(*n, WireValue::integer)).collect()
            }
            (VectorKind::Real, VectorData::Real(v)) => {
                v.iter().map(|n| na_or(*n, WireValue::real)).collect()
            }
            (VectorKind::Complex, VectorData::Complex(v)) => v
                .iter()
                .map(|c| na_or(*c, |c| WireValue::new(Value::Complex(c))))
                .collect(),
            (VectorKind::Character, VectorData::Character(v)) => v
                .iter()
                .map(|s| match s {
                    Some(s) => WireValue::string(self.text(s)),
                    None => WireValue::na(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Cell-range objects become `RangeRef`; any other S4 object is nil.
    fn encode_object(&self, object: &S4Object) -> WireValue {
        if object.class != self.range_class {
            tracing::debug!("S4 class {} has no wire form, encoding as nil", object.class);
            return WireValue::nil();
        }
        let bound = |name: &str| {
            object
                .slot(name)
                .and_then(RValue::as_real)
                .filter(|n| *n >= 0.0)
                .map(|n| n as u32)
                .unwrap_or(0)
        };
        WireValue::range(RangeRef {
            start_row: bound(slot::R1),
            start_column: bound(slot::C1),
            end_row: bound(slot::R2),
            end_column: bound(slot::C2),
            sheet_id: object.slot(slot::SHEET_ID).map(sheet_id).unwrap_or(0),
        })
    }

    /// Element names from the names attribute. Empty names stay empty.
    fn names(&self, value: &RValue) -> Option<Vec<String>> {
        let names = value.attr(attr::NAMES)?;
        let strings = self.strings(Some(names));
        if strings.is_none() {
            tracing::debug!("ignoring non-character names attribute");
        }
        strings
    }

    fn attach_dimnames(&self, value: &RValue, array: &mut Array) {
        let dimnames = match value.attr(attr::DIMNAMES) {
            Some(d) => d,
            None => return,
        };
        let parts = match dimnames.as_list() {
            Some(parts) => parts,
            None => {
                tracing::debug!("ignoring dimnames of type {}", type_name(dimnames));
                return;
            }
        };
        if let Some(rownames) = parts.first().and_then(|p| self.strings(Some(p))) {
            array.rownames = rownames;
        }
        if let Some(colnames) = parts.get(1).and_then(|p| self.strings(Some(p))) {
            array.colnames = colnames;
        }
        if parts.len() > 2 {
            tracing::debug!("ignoring dimnames beyond two dimensions ({} given)", parts.len());
        }
    }

    /// A character vector as UTF-8 strings. NA reads as "NA".
    fn strings(&self, value: Option<&RValue>) -> Option<Vec<String>> {
        let values = value?.as_character()?;
        Some(
            values
                .iter()
                .map(|s| match s {
                    Some(s) => self.text(s),
                    None => "NA".to_string(),
                })
                .collect(),
        )
    }

    fn text(&self, s: &RString) -> String {
        to_utf8(s.as_bytes(), self.code_page).into_owned()
    }
}

fn na_or<T>(value: Option<T>, f: impl FnOnce(T) -> WireValue) -> WireValue {
    match value {
        Some(v) => f(v),
        None => WireValue::na(),
    }
}

/// Factor codes are 1-based. Codes outside the level table keep their raw value.
fn factor_level(code: i32, levels: &[String]) -> WireValue {
    match usize::try_from(code) {
        Ok(i) if i >= 1 && i <= levels.len() => WireValue::string(levels[i - 1].clone()),
        _ => WireValue::integer(code),
    }
}

/// The sheet id slot holds the high and low halves, as a list of two
/// integers or an integer vector of length two.
fn sheet_id(value: &RValue) -> u64 {
    let halves: Vec<i32> = match value.data() {
        Some(VectorData::List(items)) => items.iter().filter_map(RValue::as_integer).collect(),
        Some(VectorData::Integer(v)) => v.iter().flatten().copied().collect(),
        Some(VectorData::Real(v)) => v.iter().flatten().map(|n| *n as i64 as i32).collect(),
        _ => Vec::new(),
    };
    match halves.as_slice() {
        [high, low] => RangeRef::sheet_id_from_halves(*high, *low),
        [low] => *low as u32 as u64,
        _ => 0,
    }
}

fn type_name(value: &RValue) -> &'static str {
    match value {
        RValue::Null => "NULL",
        RValue::MissingArg => "symbol",
        RValue::Vector(v) => v.data.type_name(),
        RValue::Environment(_) => "environment",
        RValue::ExternalPtr(_) => "externalptr",
        RValue::S4(_) => "S4",
    }
}
