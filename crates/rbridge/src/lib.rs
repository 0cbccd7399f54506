//! # rbridge
//!
//! Value marshalling and a synchronous call bridge between an R runtime and a
//! spreadsheet host.
//!
//! The two sides have incompatible value models. Values cross the boundary as
//! [`WireValue`]s: the [`Encoder`] turns runtime values into wire values and
//! the [`Decoder`] turns them back. Calls in either direction travel as
//! [`CallEnvelope`]s through a [`Bridge`], which resolves qualified function
//! names, evaluates requests from the host, and forwards calls on foreign
//! (host-owned) objects.
//!
//! ## Example
//!
//! ```
//! use rbridge::{Encoder, Decoder, NoObjects, BridgeConfig, RValue};
//!
//! let config = BridgeConfig::default();
//! let frame = RValue::data_frame(vec![
//!     ("id", RValue::integers([1, 2, 3])),
//!     ("score", RValue::reals([0.5, 0.25, 1.0])),
//! ]);
//!
//! let wire = Encoder::new(&config).encode(&frame);
//! let array = wire.as_array().unwrap();
//! assert_eq!(array.shape(), (3, 2));
//! assert_eq!(array.colnames, vec!["id", "score"]);
//!
//! // Columns come back as one numeric matrix.
//! let value = Decoder::new(&NoObjects, &config).decode(&wire);
//! assert_eq!(value.dim(), Some((3, 2)));
//! ```

pub mod channel;
pub mod codepage;
pub mod config;
pub mod decode;
pub mod descriptor;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod handle;
pub mod runtime;
pub mod value;

pub use channel::{HostChannel, JsonLinesChannel};
pub use codepage::CodePage;
pub use config::BridgeConfig;
pub use decode::Decoder;
pub use descriptor::{describe, function_key, handle_of, ForeignObjectBuilder};
pub use dispatch::{next_call_id, Bridge};
pub use encode::Encoder;
pub use error::{BridgeError, Result};
pub use handle::{ExternalPtr, ForeignHandle, ReleaseHook};
pub use runtime::{NoObjects, ObjectFactory, Runtime};
pub use value::{EnvId, RString, RValue, S4Object, Vector, VectorData};

pub use rbridge_protocol::{CallEnvelope, CallKind, WireValue};
