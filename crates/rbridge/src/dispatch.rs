//! The call dispatcher.
//!
//! Calls run synchronously on the calling thread. When the host answers a
//! call with a call of its own, that nested call is evaluated by plain
//! recursion and its value becomes the result of the original call.
//!
//! ```text
//! Building -> Sent(id) -> ResultReceived
//!                      -> NestedCallReceived -> (recurse) -> ResultReceived
//!                      -> Failed
//! ```

use std::io::{BufRead, Write};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use rbridge_protocol::{
    ArgumentDescriptor, CallEnvelope, CallKind, CallTarget, ConsoleMessage, ForeignObjectRef,
    FunctionCall, FunctionDescriptor, FunctionList, Operation, Value, WireValue,
};

use crate::channel::HostChannel;
use crate::config::BridgeConfig;
use crate::decode::Decoder;
use crate::descriptor::handle_of;
use crate::encode::Encoder;
use crate::error::{BridgeError, Result};
use crate::handle::ReleaseHook;
use crate::runtime::Runtime;
use crate::value::{EnvId, RValue};

static NEXT_CALL_ID: AtomicU32 = AtomicU32::new(1);

/// Next correlation id. Monotonic for the life of the process.
pub fn next_call_id() -> u32 {
    NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tells the host that the runtime dropped its last reference to a handle.
struct Releaser {
    channel: Rc<dyn HostChannel>,
    command: String,
}

impl ReleaseHook for Releaser {
    fn release(&self, handle: u64) {
        let call = FunctionCall::script(
            self.command.as_str(),
            vec![WireValue::foreign(ForeignObjectRef::handle_only(handle))],
        );
        let request = CallEnvelope::call(next_call_id(), true, call);
        if let Err(e) = self.channel.call(&request) {
            tracing::warn!("failed to release foreign handle {:#x}: {}", handle, e);
        }
    }
}

/// Connects a script runtime to a host.
pub struct Bridge<R: Runtime> {
    runtime: R,
    channel: Rc<dyn HostChannel>,
    config: BridgeConfig,
    encoder: Encoder,
    releaser: Rc<dyn ReleaseHook>,
}

impl<R: Runtime> Bridge<R> {
    pub fn new(runtime: R, channel: Rc<dyn HostChannel>, config: BridgeConfig) -> Self {
        let releaser: Rc<dyn ReleaseHook> = Rc::new(Releaser {
            channel: channel.clone(),
            command: config.release_command.clone(),
        });
        Self {
            runtime,
            encoder: Encoder::new(&config),
            channel,
            config,
            releaser,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn encode(&self, value: &RValue) -> WireValue {
        self.encoder.encode(value)
    }

    /// Decode a wire value. Foreign objects are released through the host
    /// when the runtime drops them.
    pub fn decode(&self, wire: &WireValue) -> RValue {
        Decoder::new(&self.runtime, &self.config)
            .with_release(self.releaser.clone())
            .decode(wire)
    }

    // ========================================================================
    // Host -> runtime
    // ========================================================================

    /// Answer one inbound envelope. Runtime failures become `err` payloads.
    pub fn handle_request(&self, request: &CallEnvelope) -> CallEnvelope {
        let id = request.id;
        tracing::trace!("handling {} request {}", request.operation_name(), id);

        let outcome = match &request.operation {
            Operation::FunctionCall(call) => self.invoke(call),
            // Nothing to evaluate: `0L`, whether or not the caller waits.
            Operation::Code(code) if code.lines.is_empty() => {
                return CallEnvelope::result(id, WireValue::integer(0));
            }
            Operation::Code(code) => self.execute(&code.lines),
            Operation::FunctionList(_) => {
                return match self.list_functions() {
                    Ok(list) => CallEnvelope::new(id, false, Operation::FunctionList(list)),
                    Err(e) => CallEnvelope::error(id, e.to_string()),
                };
            }
            _ => {
                return CallEnvelope::error(
                    id,
                    format!("unsupported request: {}", request.operation_name()),
                );
            }
        };

        match outcome {
            // The result is not encoded when nobody waits for it.
            Ok(value) if request.wait => CallEnvelope::result(id, self.encode(&value)),
            Ok(_) => CallEnvelope::result(id, WireValue::nil()),
            Err(e) => {
                tracing::debug!("request {} failed: {}", id, e);
                CallEnvelope::error(id, e.to_string())
            }
        }
    }

    /// Evaluate a script-target call: arguments are decoded and applied
    /// positionally to the named function.
    pub fn invoke(&self, call: &FunctionCall) -> Result<RValue> {
        if call.target != CallTarget::Script {
            return Err(BridgeError::InvalidArgument(format!(
                "cannot invoke {:?} target `{}` in the runtime",
                call.target, call.function
            )));
        }
        let args = call.arguments.iter().map(|a| self.decode(a)).collect();
        self.call_script(&call.function, args)
    }

    /// Call a possibly qualified function (`pkg$sub$fn`) with positional
    /// arguments.
    pub fn call_script(&self, function: &str, args: Vec<RValue>) -> Result<RValue> {
        let (env, name) = self.resolve(function)?;
        tracing::trace!("calling {} with {} arguments", function, args.len());
        self.runtime.call(env, &name, args)
    }

    /// Split a qualified name and look up every component but the last,
    /// starting from the global context. A component that resolves to an
    /// environment becomes the lookup context for the next one.
    pub fn resolve(&self, qualified: &str) -> Result<(EnvId, String)> {
        let parts: Vec<&str> = qualified
            .split(self.config.qualifier)
            .filter(|p| !p.is_empty())
            .collect();
        let (name, namespaces) = match parts.split_last() {
            Some(split) => split,
            None => {
                return Err(BridgeError::InvalidArgument(format!(
                    "empty function name `{qualified}`"
                )))
            }
        };

        let mut env = self.runtime.global_env();
        for component in namespaces {
            let value = self
                .runtime
                .get(component, env)
                .map_err(|_| BridgeError::Resolution {
                    name: qualified.to_string(),
                    component: component.to_string(),
                })?;
            match value {
                RValue::Environment(inner) => env = inner,
                _ => tracing::debug!("`{}` is not an environment, keeping context", component),
            }
        }
        Ok((env, name.to_string()))
    }

    /// Parse and evaluate source lines. No lines evaluates to `0L`.
    pub fn execute(&self, lines: &[String]) -> Result<RValue> {
        if lines.is_empty() {
            return Ok(RValue::integer(0));
        }
        self.runtime.evaluate(lines)
    }

    /// Build the function catalog from the runtime's listing expression.
    ///
    /// The expression returns a list of `list(name = , arguments = list(list(name = , default = ), ...))`.
    pub fn list_functions(&self) -> Result<FunctionList> {
        let listing = self.runtime.evaluate(&[self.config.list_functions.clone()])?;
        let wire = self.encode(&listing);

        let functions = elements(&wire)
            .iter()
            .map(|entry| {
                let mut descriptor = FunctionDescriptor::default();
                for field in elements(entry) {
                    match field.name.as_str() {
                        "name" => descriptor.name = field.as_str().unwrap_or_default().to_string(),
                        "arguments" => {
                            descriptor.arguments = elements(field).iter().map(argument).collect()
                        }
                        _ => {}
                    }
                }
                descriptor
            })
            .collect();
        Ok(FunctionList { functions })
    }

    // ========================================================================
    // Runtime -> host
    // ========================================================================

    /// Call a member of a foreign object and wait for the host's answer.
    ///
    /// A list of `arguments` is unpacked into positional arguments; any other
    /// value is passed as the single argument.
    pub fn foreign_call(
        &self,
        name: &str,
        call_kind: CallKind,
        index: u32,
        handle: u64,
        arguments: &RValue,
    ) -> Result<RValue> {
        if name.is_empty() {
            return Ok(RValue::Null);
        }
        let arguments = match arguments.as_list() {
            Some(list) => list.iter().map(|a| self.encode(a)).collect(),
            None => vec![self.encode(arguments)],
        };
        let call = FunctionCall {
            target: CallTarget::Foreign,
            function: name.to_string(),
            index,
            handle,
            call_kind,
            arguments,
        };
        let request = CallEnvelope::call(next_call_id(), true, call);
        tracing::trace!("foreign call {} {} ({}) on {:#x}", request.id, name, call_kind, handle);

        let response = self.send(&request)?;
        let answered_with = response.operation_name();
        match response.operation {
            Operation::FunctionCall(nested) => {
                tracing::trace!("call {} answered with nested call {}", request.id, nested.function);
                self.invoke(&nested)
            }
            Operation::Result(value) => match value.value {
                // Register the object in the runtime before handing it out.
                Value::ForeignObject(_) => self.invoke(&FunctionCall::script(
                    self.config.install_foreign_object.as_str(),
                    vec![value],
                )),
                _ => Ok(self.decode(&value)),
            },
            Operation::Err(message) => Err(BridgeError::Remote(message)),
            _ => Err(BridgeError::Protocol(format!(
                "unexpected {} in answer to call {}",
                answered_with, request.id
            ))),
        }
    }

    /// [`Bridge::foreign_call`] with loosely typed runtime arguments.
    ///
    /// `call_kind` strings other than `get`/`put` mean a method call; `index`
    /// may be integer or double; `pointer` is an external pointer or a
    /// foreign object descriptor.
    pub fn foreign_callback(
        &self,
        name: &RValue,
        call_kind: &RValue,
        index: &RValue,
        pointer: &RValue,
        arguments: &RValue,
    ) -> Result<RValue> {
        let name = name.as_str().unwrap_or_default();
        let call_kind = call_kind
            .as_str()
            .and_then(CallKind::parse)
            .unwrap_or_default();
        let index = index
            .as_real()
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32)
            .unwrap_or(0);
        let handle = handle_of(pointer).ok_or_else(|| {
            BridgeError::InvalidArgument(format!("`{name}` called without a foreign object"))
        })?;
        self.foreign_call(name, call_kind, index, handle, arguments)
    }

    /// Send a named command to the host with an optional data argument.
    ///
    /// The console-history command travels on the console channel and yields
    /// NULL if the host does not answer it.
    pub fn command(&self, command: &str, data: Option<&RValue>) -> Result<RValue> {
        if command.is_empty() {
            return Ok(RValue::Null);
        }

        if command == self.config.console_history_command {
            let history = self.encode(data.unwrap_or(&RValue::Null));
            let message = CallEnvelope::new(
                next_call_id(),
                true,
                Operation::Console(ConsoleMessage::History(history)),
            );
            return Ok(match self.channel.console(&message) {
                Ok(CallEnvelope {
                    operation: Operation::Result(value),
                    ..
                }) => self.decode(&value),
                Ok(_) => RValue::Null,
                Err(e) => {
                    tracing::warn!("console history not delivered: {}", e);
                    RValue::Null
                }
            });
        }

        let arguments = data.map(|d| vec![self.encode(d)]).unwrap_or_default();
        let request = CallEnvelope::call(next_call_id(), true, FunctionCall::script(command, arguments));
        let response = self.send(&request)?;
        let answered_with = response.operation_name();
        match response.operation {
            Operation::Result(value) => Ok(self.decode(&value)),
            Operation::Err(message) => Err(BridgeError::Remote(message)),
            _ => {
                tracing::debug!("command {} answered with {}", command, answered_with);
                Ok(RValue::Null)
            }
        }
    }

    fn send(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        self.channel.call(request).map_err(|e| match e {
            BridgeError::Transport(_) => e,
            other => BridgeError::Transport(other.to_string()),
        })
    }

    // ========================================================================
    // Request loop
    // ========================================================================

    /// Answer inbound envelopes, one JSON object per line, until the reader
    /// is exhausted. Lines that do not parse get an error response with id 0.
    pub fn serve(&self, reader: impl BufRead, mut writer: impl Write) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<CallEnvelope>(line) {
                Ok(request) => self.handle_request(&request),
                Err(e) => {
                    tracing::warn!("malformed request: {}", e);
                    CallEnvelope::error(0, format!("malformed request: {e}"))
                }
            };
            writeln!(writer, "{}", serde_json::to_string(&response)?)?;
            writer.flush()?;
        }
        tracing::debug!("request stream closed");
        Ok(())
    }
}

/// Elements of an array value; scalars and nil have none.
fn elements(wire: &WireValue) -> &[WireValue] {
    wire.as_array().map(|a| a.data.as_slice()).unwrap_or_default()
}

fn argument(entry: &WireValue) -> ArgumentDescriptor {
    let mut argument = ArgumentDescriptor::default();
    for field in elements(entry) {
        match field.name.as_str() {
            "name" => argument.name = field.as_str().unwrap_or_default().to_string(),
            "default" => argument.default_value = Some(WireValue::new(field.value.clone())),
            _ => {}
        }
    }
    argument
}
