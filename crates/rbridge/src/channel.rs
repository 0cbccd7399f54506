//! Delivery of envelopes to the host.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use rbridge_protocol::CallEnvelope;

use crate::error::{BridgeError, Result};

/// The host side of the bridge. Each call blocks until the host answers.
pub trait HostChannel {
    /// Deliver a request and wait for its response.
    fn call(&self, request: &CallEnvelope) -> Result<CallEnvelope>;

    /// Deliver a console message. Hosts without a separate console channel
    /// receive it on the call channel.
    fn console(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        self.call(request)
    }
}

impl<T: HostChannel + ?Sized> HostChannel for Rc<T> {
    fn call(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        (**self).call(request)
    }

    fn console(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        (**self).console(request)
    }
}

/// A host reached over a pair of byte streams, one JSON envelope per line.
pub struct JsonLinesChannel<Rd, W> {
    reader: RefCell<Rd>,
    writer: RefCell<W>,
}

impl<Rd: BufRead, W: Write> JsonLinesChannel<Rd, W> {
    pub fn new(reader: Rd, writer: W) -> Self {
        Self {
            reader: RefCell::new(reader),
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> (Rd, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }

    fn send(&self, request: &CallEnvelope) -> Result<()> {
        let json = serde_json::to_string(request)?;
        let mut writer = self.writer.borrow_mut();
        writeln!(writer, "{json}").map_err(|e| BridgeError::Transport(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }

    fn receive(&self) -> Result<CallEnvelope> {
        let mut line = String::new();
        self.reader
            .borrow_mut()
            .read_line(&mut line)
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        if line.is_empty() {
            return Err(BridgeError::Transport("host closed the channel".into()));
        }
        serde_json::from_str(line.trim_end())
            .map_err(|e| BridgeError::Protocol(format!("malformed response: {e}")))
    }
}

impl<Rd: BufRead, W: Write> HostChannel for JsonLinesChannel<Rd, W> {
    fn call(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        self.send(request)?;
        let response = self.receive()?;
        if response.id != request.id {
            tracing::warn!(
                "response id {} does not match request id {}",
                response.id,
                request.id
            );
        }
        tracing::trace!("call {} answered with {}", request.id, response.operation_name());
        Ok(response)
    }
}
