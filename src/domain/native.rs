use crate::domain::model::ZoneKind;
use crate::domain::ports::{DragEndCallback, EditEndCallback, NativeMap};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

const REF_KEY: &str = "$ref";

/// Opaque id of an object living inside a provider SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NativeObject(u64);

impl NativeObject {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Encodes the object as a native argument.
    pub fn to_value(self) -> Value {
        json!({ "$ref": self.0 })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.get(REF_KEY)?.as_u64().map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Marks native mutations as code-originated.
///
/// The guard stays raised until the bridge has run one deferred task after
/// the mutation, so change events the SDK queues in response are still
/// recognised as echoes.
#[derive(Debug, Clone, Default)]
pub struct UpdateGuard {
    depth: Rc<Cell<u32>>,
}

impl UpdateGuard {
    pub fn is_active(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn run<T>(&self, map: &dyn NativeMap, mutation: impl FnOnce() -> T) -> T {
        self.depth.set(self.depth.get() + 1);
        let out = mutation();
        let depth = Rc::clone(&self.depth);
        map.defer(Box::new(move || depth.set(depth.get().saturating_sub(1))));
        out
    }
}

/// Adapter-owned reference to one native marker or zone.
pub struct NativeHandle {
    pub(crate) id: String,
    pub(crate) map: Rc<dyn NativeMap>,
    pub(crate) object: NativeObject,
    pub(crate) kind: Option<ZoneKind>,
    pub(crate) listeners: RefCell<Vec<ListenerId>>,
    pub(crate) guard: UpdateGuard,
    pub(crate) editing: Cell<bool>,
    pub(crate) disposed: Cell<bool>,
    pub(crate) on_drag_end: Option<DragEndCallback>,
    pub(crate) on_edit_end: Option<EditEndCallback>,
}

impl NativeHandle {
    pub(crate) fn marker(
        id: &str,
        map: Rc<dyn NativeMap>,
        object: NativeObject,
        guard: UpdateGuard,
        on_drag_end: DragEndCallback,
    ) -> Self {
        Self {
            id: id.to_string(),
            map,
            object,
            kind: None,
            listeners: RefCell::new(Vec::new()),
            guard,
            editing: Cell::new(false),
            disposed: Cell::new(false),
            on_drag_end: Some(on_drag_end),
            on_edit_end: None,
        }
    }

    pub(crate) fn zone(
        id: &str,
        kind: ZoneKind,
        map: Rc<dyn NativeMap>,
        object: NativeObject,
        guard: UpdateGuard,
        on_edit_end: EditEndCallback,
    ) -> Self {
        Self {
            id: id.to_string(),
            map,
            object,
            kind: Some(kind),
            listeners: RefCell::new(Vec::new()),
            guard,
            editing: Cell::new(false),
            disposed: Cell::new(false),
            on_drag_end: None,
            on_edit_end: Some(on_edit_end),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The native object id, for diagnostics against the bridge.
    pub fn native_object(&self) -> NativeObject {
        self.object
    }

    pub fn is_editing(&self) -> bool {
        self.editing.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub(crate) fn track(&self, listener: ListenerId) {
        self.listeners.borrow_mut().push(listener);
    }

    pub(crate) fn weak_map(&self) -> Weak<dyn NativeMap> {
        Rc::downgrade(&self.map)
    }

    /// Detaches every listener, then destroys the native object. Later
    /// calls are no-ops.
    pub(crate) fn dispose(&self, destroy: impl FnOnce(&dyn NativeMap, NativeObject) -> Result<()>) {
        if self.disposed.replace(true) {
            return;
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in listeners {
            self.map.unlisten(listener);
        }
        if let Err(e) = destroy(self.map.as_ref(), self.object) {
            tracing::warn!("Failed to dispose native object for '{}': {}", self.id, e);
        }
        self.editing.set(false);
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("id", &self.id)
            .field("provider", &self.map.provider())
            .field("object", &self.object)
            .field("kind", &self.kind)
            .field("editing", &self.editing.get())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// Result of an update that may have had to rebuild the native object.
#[derive(Debug)]
pub enum UpdateOutcome {
    Mutated,
    Replaced(NativeHandle),
}

/// Whether a provider could honour an optional operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Applied,
    Gap,
}

/// How a provider's SDK hosts shape editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// One shared editor session at a time, routed through the edit session.
    Centralized,
    /// Independent editors per shape.
    PerEntity,
    /// No native vertex editor.
    Unsupported,
}

/// Live map-click listener. `unsubscribe` is idempotent.
pub struct Subscription {
    map: Weak<dyn NativeMap>,
    listener: ListenerId,
    active: Cell<bool>,
}

impl Subscription {
    pub(crate) fn new(map: &Rc<dyn NativeMap>, listener: ListenerId) -> Self {
        Self {
            map: Rc::downgrade(map),
            listener,
            active: Cell::new(true),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(map) = self.map.upgrade() {
            map.unlisten(self.listener);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("listener", &self.listener)
            .field("active", &self.active.get())
            .finish()
    }
}
