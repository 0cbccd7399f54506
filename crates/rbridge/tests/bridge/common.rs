//! Test doubles: an in-memory runtime and a scripted host.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use rbridge::{
    Bridge, BridgeConfig, BridgeError, CallEnvelope, EnvId, ObjectFactory, RValue, Result,
    Runtime, S4Object, WireValue,
};
use rbridge_protocol::Operation;

pub const GLOBAL: EnvId = EnvId(0);

pub type Builtin = Box<dyn Fn(&[RValue]) -> Result<RValue>>;

#[derive(Default)]
struct Env {
    values: HashMap<String, RValue>,
    functions: HashMap<String, Builtin>,
}

/// A recorded call: the context it ran in, the function name and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub env: EnvId,
    pub function: String,
    pub args: Vec<RValue>,
}

/// An in-memory runtime with nested environments and native functions.
///
/// `evaluate` understands just enough to exercise the bridge: unbalanced
/// parentheses are a parse error, `stop(` raises, registered expressions
/// return their value and numeric literals evaluate to themselves.
#[derive(Default)]
pub struct MockRuntime {
    envs: HashMap<u64, Env>,
    expressions: HashMap<String, RValue>,
    classes: Vec<String>,
    pub invocations: RefCell<Vec<Invocation>>,
    pub evaluated: RefCell<Vec<Vec<String>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        let mut runtime = Self::default();
        runtime.envs.insert(GLOBAL.0, Env::default());
        runtime
    }

    pub fn bind(mut self, env: EnvId, name: &str, value: RValue) -> Self {
        self.envs
            .entry(env.0)
            .or_default()
            .values
            .insert(name.to_string(), value);
        self
    }

    pub fn function(
        mut self,
        env: EnvId,
        name: &str,
        f: impl Fn(&[RValue]) -> Result<RValue> + 'static,
    ) -> Self {
        self.envs
            .entry(env.0)
            .or_default()
            .functions
            .insert(name.to_string(), Box::new(f));
        self
    }

    pub fn expression(mut self, source: &str, value: RValue) -> Self {
        self.expressions.insert(source.to_string(), value);
        self
    }

    pub fn class(mut self, name: &str) -> Self {
        self.classes.push(name.to_string());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    fn lookup<T>(&self, env: EnvId, find: impl Fn(&Env) -> Option<T>) -> Option<T> {
        self.envs
            .get(&env.0)
            .and_then(&find)
            .or_else(|| self.envs.get(&GLOBAL.0).and_then(&find))
    }
}

impl ObjectFactory for MockRuntime {
    fn new_object(&self, class: &str) -> Option<S4Object> {
        self.classes
            .iter()
            .any(|c| c == class)
            .then(|| S4Object::new(class))
    }
}

impl Runtime for MockRuntime {
    fn global_env(&self) -> EnvId {
        GLOBAL
    }

    fn get(&self, name: &str, env: EnvId) -> Result<RValue> {
        self.lookup(env, |e| e.values.get(name).cloned())
            .ok_or_else(|| BridgeError::Evaluation(format!("object '{name}' not found")))
    }

    fn call(&self, env: EnvId, function: &str, args: Vec<RValue>) -> Result<RValue> {
        self.invocations.borrow_mut().push(Invocation {
            env,
            function: function.to_string(),
            args: args.clone(),
        });
        let found = self.lookup(env, |e| e.functions.get(function).map(|f| f(&args)));
        found.unwrap_or_else(|| {
            Err(BridgeError::Evaluation(format!(
                "could not find function \"{function}\""
            )))
        })
    }

    fn evaluate(&self, lines: &[String]) -> Result<RValue> {
        self.evaluated.borrow_mut().push(lines.to_vec());
        let source = lines.join("\n");

        let opened = source.matches('(').count();
        let closed = source.matches(')').count();
        if opened != closed {
            return Err(BridgeError::Parse("unexpected end of input".into()));
        }
        if source.contains("stop(") {
            return Err(BridgeError::Evaluation("boom".into()));
        }

        let last = lines.last().map(|l| l.trim()).unwrap_or_default();
        if let Some(value) = self.expressions.get(last) {
            return Ok(value.clone());
        }
        if let Some(n) = last.strip_suffix('L').and_then(|n| n.parse::<i32>().ok()) {
            return Ok(RValue::integer(n));
        }
        Ok(last.parse::<f64>().map(RValue::real).unwrap_or(RValue::Null))
    }
}

/// A host that records what it receives and answers from a script.
///
/// Release requests are answered immediately and recorded in `released`
/// without consuming scripted answers.
#[derive(Default)]
pub struct MockHost {
    pub requests: RefCell<Vec<CallEnvelope>>,
    pub console_messages: RefCell<Vec<CallEnvelope>>,
    pub released: RefCell<Vec<u64>>,
    answers: RefCell<VecDeque<Operation>>,
    console_answer: RefCell<Option<Operation>>,
    failing: Cell<bool>,
}

impl MockHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Queue the payload of the next answer.
    pub fn answer(&self, operation: Operation) {
        self.answers.borrow_mut().push_back(operation);
    }

    pub fn answer_console(&self, operation: Operation) {
        *self.console_answer.borrow_mut() = Some(operation);
    }

    /// Make every subsequent delivery fail.
    pub fn fail(&self) {
        self.failing.set(true);
    }

    pub fn requests(&self) -> Vec<CallEnvelope> {
        self.requests.borrow().clone()
    }

    pub fn released(&self) -> Vec<u64> {
        self.released.borrow().clone()
    }
}

impl rbridge::HostChannel for MockHost {
    fn call(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        if let Some(call) = request.function_call() {
            if call.function == BridgeConfig::default().release_command {
                let handle = call
                    .arguments
                    .first()
                    .and_then(WireValue::as_foreign_object)
                    .map(|o| o.handle)
                    .unwrap_or_default();
                self.released.borrow_mut().push(handle);
                return Ok(CallEnvelope::result(request.id, WireValue::boolean(true)));
            }
        }

        self.requests.borrow_mut().push(request.clone());
        if self.failing.get() {
            return Err(BridgeError::Transport("pipe closed".into()));
        }
        let operation = self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(Operation::Result(WireValue::nil()));
        Ok(CallEnvelope::new(request.id, false, operation))
    }

    fn console(&self, request: &CallEnvelope) -> Result<CallEnvelope> {
        self.console_messages.borrow_mut().push(request.clone());
        if self.failing.get() {
            return Err(BridgeError::Transport("pipe closed".into()));
        }
        let operation = self
            .console_answer
            .borrow_mut()
            .take()
            .unwrap_or(Operation::Result(WireValue::nil()));
        Ok(CallEnvelope::new(request.id, false, operation))
    }
}

/// A bridge over `runtime` talking to `host`, with default configuration.
pub fn bridge(runtime: MockRuntime, host: &Rc<MockHost>) -> Bridge<MockRuntime> {
    Bridge::new(runtime, host.clone(), BridgeConfig::default())
}
