//! In-process `NativeMap` used by the CLI renderer and the test suite.
//!
//! Objects are property bags. `setFoo(x)` stores `foo`, `getFoo()` reads it
//! back, `options.set({..})` merges into `options.*`, and `destroy`,
//! `setMap(null)` and `geoObjects.add/remove` track whether an object is on
//! the map. Every call is recorded. User gestures are simulated with
//! `set_prop` followed by `emit`.

use crate::domain::model::ProviderId;
use crate::domain::native::{ListenerId, NativeObject};
use crate::domain::ports::{NativeListener, NativeMap};
use crate::utils::error::{GeoError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

const MAP_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeCall {
    pub target: NativeObject,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlessObject {
    pub class: String,
    pub args: Vec<Value>,
    pub props: BTreeMap<String, Value>,
    pub attached: bool,
}

struct HeadlessListener {
    target: NativeObject,
    event: String,
    callback: NativeListener,
}

#[derive(Default)]
struct HeadlessState {
    next_id: u64,
    objects: BTreeMap<NativeObject, HeadlessObject>,
    listeners: BTreeMap<ListenerId, HeadlessListener>,
    calls: Vec<NativeCall>,
    echoes: HashMap<String, Vec<String>>,
    failures: HashSet<String>,
}

pub struct HeadlessMap {
    provider: ProviderId,
    state: RefCell<HeadlessState>,
    tasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl HeadlessMap {
    pub fn new(provider: ProviderId) -> Self {
        let mut state = HeadlessState {
            next_id: MAP_ID + 1,
            ..Default::default()
        };
        state.objects.insert(
            NativeObject::from_raw(MAP_ID),
            HeadlessObject {
                class: "Map".to_string(),
                args: Vec::new(),
                props: BTreeMap::new(),
                attached: true,
            },
        );
        Self {
            provider,
            state: RefCell::new(state),
            tasks: RefCell::new(VecDeque::new()),
        }
    }

    pub fn shared(provider: ProviderId) -> Rc<Self> {
        Rc::new(Self::new(provider))
    }

    /// Makes `method` fire `event` on its target, the way SDKs report
    /// programmatic changes through their change events.
    pub fn echo_on(&self, method: &str, event: &str) {
        self.state
            .borrow_mut()
            .echoes
            .entry(method.to_string())
            .or_default()
            .push(event.to_string());
    }

    /// Makes every later `call` of `name`, or `listen` for an event called
    /// `name`, fail with a native error.
    pub fn fail_on(&self, name: &str) {
        self.state.borrow_mut().failures.insert(name.to_string());
    }

    fn check_failure(&self, name: &str, target: NativeObject) -> Result<()> {
        if self.state.borrow().failures.contains(name) {
            return Err(GeoError::native(format!("{} failed on #{}", name, target.raw())));
        }
        Ok(())
    }

    /// Dispatches `event` to every listener on `target`; returns how many ran.
    pub fn emit(&self, target: NativeObject, event: &str, payload: Value) -> usize {
        let callbacks: Vec<NativeListener> = self
            .state
            .borrow()
            .listeners
            .values()
            .filter(|l| l.target == target && l.event == event)
            .map(|l| Rc::clone(&l.callback))
            .collect();
        for callback in &callbacks {
            callback(&payload);
        }
        callbacks.len()
    }

    /// Changes native state without recording a call or firing events.
    pub fn set_prop(&self, target: NativeObject, key: &str, value: Value) {
        if let Some(object) = self.state.borrow_mut().objects.get_mut(&target) {
            object.props.insert(key.to_string(), value);
        }
    }

    pub fn prop(&self, target: NativeObject, key: &str) -> Option<Value> {
        self.state.borrow().objects.get(&target)?.props.get(key).cloned()
    }

    /// Runs the tasks queued so far; tasks queued while running wait for the
    /// next tick. Returns how many ran.
    pub fn tick(&self) -> usize {
        let batch: Vec<Box<dyn FnOnce()>> = self.tasks.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }
        ran
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn object(&self, target: NativeObject) -> Option<HeadlessObject> {
        self.state.borrow().objects.get(&target).cloned()
    }

    /// Objects currently shown on the map, excluding the map itself.
    pub fn live_objects(&self) -> Vec<(NativeObject, HeadlessObject)> {
        self.state
            .borrow()
            .objects
            .iter()
            .filter(|(id, o)| id.raw() != MAP_ID && o.attached)
            .map(|(id, o)| (*id, o.clone()))
            .collect()
    }

    pub fn live_count(&self, class: &str) -> usize {
        self.live_objects().iter().filter(|(_, o)| o.class == class).count()
    }

    pub fn listener_count(&self, target: NativeObject) -> usize {
        self.state
            .borrow()
            .listeners
            .values()
            .filter(|l| l.target == target)
            .count()
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn calls_to(&self, method: &str) -> Vec<NativeCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn references_map(args: &[Value]) -> bool {
        let is_map = |v: &Value| NativeObject::from_value(v).map(|o| o.raw()) == Some(MAP_ID);
        args.iter()
            .any(|arg| is_map(arg) || arg.get("map").map(is_map).unwrap_or(false))
    }

    fn set_attached(&self, target: &Value, attached: bool) -> Result<()> {
        let object = NativeObject::from_value(target)
            .ok_or_else(|| GeoError::native("geoObjects expects an object reference"))?;
        let mut state = self.state.borrow_mut();
        let entry = state
            .objects
            .get_mut(&object)
            .ok_or_else(|| GeoError::native(format!("no native object #{}", object.raw())))?;
        entry.attached = attached;
        Ok(())
    }
}

fn split_method(method: &str) -> (Option<&str>, &str) {
    match method.rsplit_once('.') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, method),
    }
}

fn prop_key(prefix: Option<&str>, name: &str) -> String {
    let mut chars = name.chars();
    let field: String = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    };
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, field),
        None => field,
    }
}

fn accessor<'a>(name: &'a str, verb: &str) -> Option<&'a str> {
    name.strip_prefix(verb)
        .filter(|rest| rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
}

impl NativeMap for HeadlessMap {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn map_object(&self) -> NativeObject {
        NativeObject::from_raw(MAP_ID)
    }

    fn construct(&self, class: &str, args: Vec<Value>) -> Result<NativeObject> {
        let mut state = self.state.borrow_mut();
        let id = NativeObject::from_raw(state.next_id);
        state.next_id += 1;

        let mut props = BTreeMap::new();
        for arg in &args {
            if let Some(options) = arg.as_object() {
                for (key, value) in options.iter().filter(|(k, _)| *k != "map") {
                    props.insert(key.clone(), value.clone());
                }
            }
        }
        state.objects.insert(
            id,
            HeadlessObject {
                class: class.to_string(),
                args: args.clone(),
                props,
                attached: Self::references_map(&args),
            },
        );
        state.calls.push(NativeCall {
            target: id,
            method: format!("new {}", class),
            args,
        });
        Ok(id)
    }

    fn call(&self, target: NativeObject, method: &str, args: Vec<Value>) -> Result<Value> {
        if !self.state.borrow().objects.contains_key(&target) {
            return Err(GeoError::native(format!(
                "{} on missing native object #{}",
                method,
                target.raw()
            )));
        }
        self.check_failure(method, target)?;
        self.state.borrow_mut().calls.push(NativeCall {
            target,
            method: method.to_string(),
            args: args.clone(),
        });

        let (prefix, name) = split_method(method);
        let result = match (method, name) {
            ("destroy", _) => {
                let mut state = self.state.borrow_mut();
                state.objects.remove(&target);
                state.listeners.retain(|_, l| l.target != target);
                Value::Null
            }
            ("geoObjects.add", _) => {
                self.set_attached(args.first().unwrap_or(&Value::Null), true)?;
                Value::Null
            }
            ("geoObjects.remove", _) => {
                self.set_attached(args.first().unwrap_or(&Value::Null), false)?;
                Value::Null
            }
            ("setMap", _) => {
                let attached = !args.first().map(Value::is_null).unwrap_or(true);
                if let Some(object) = self.state.borrow_mut().objects.get_mut(&target) {
                    object.attached = attached;
                }
                Value::Null
            }
            (_, "set") => {
                let mut state = self.state.borrow_mut();
                if let (Some(object), Some(Value::Object(fields))) =
                    (state.objects.get_mut(&target), args.first())
                {
                    for (key, value) in fields {
                        object.props.insert(prop_key(prefix, key), value.clone());
                    }
                }
                Value::Null
            }
            _ => {
                if let Some(field) = accessor(name, "set") {
                    let value = match args.as_slice() {
                        [single] => single.clone(),
                        many => Value::Array(many.to_vec()),
                    };
                    self.set_prop(target, &prop_key(prefix, field), value);
                    Value::Null
                } else if let Some(field) = accessor(name, "get") {
                    self.prop(target, &prop_key(prefix, field))
                        .unwrap_or(Value::Null)
                } else {
                    Value::Null
                }
            }
        };

        let events = self
            .state
            .borrow()
            .echoes
            .get(method)
            .cloned()
            .unwrap_or_default();
        for event in events {
            self.emit(target, &event, Value::Object(Map::new()));
        }
        Ok(result)
    }

    fn listen(&self, target: NativeObject, event: &str, listener: NativeListener) -> Result<ListenerId> {
        self.check_failure(event, target)?;
        let mut state = self.state.borrow_mut();
        if !state.objects.contains_key(&target) {
            return Err(GeoError::native(format!(
                "cannot listen for '{}' on missing object #{}",
                event,
                target.raw()
            )));
        }
        let id = ListenerId::from_raw(state.next_id);
        state.next_id += 1;
        state.listeners.insert(
            id,
            HeadlessListener {
                target,
                event: event.to_string(),
                callback: listener,
            },
        );
        Ok(id)
    }

    fn unlisten(&self, listener: ListenerId) {
        self.state.borrow_mut().listeners.remove(&listener);
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.tasks.borrow_mut().push_back(task);
    }
}
