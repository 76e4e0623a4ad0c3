use crate::core::context::MapContext;
use crate::domain::model::{GeoObject, MarkerDescriptor, Point, ProviderId, ZoneDescriptor, ZoneShape};
use crate::domain::native::{
    Capability, EditMode, ListenerId, NativeHandle, NativeObject, Subscription, UpdateOutcome,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::rc::Rc;

pub type NativeListener = Rc<dyn Fn(&Value)>;
pub type DragEndCallback = Rc<dyn Fn(Point)>;
pub type MapClickCallback = Rc<dyn Fn(Point)>;
pub type EditEndCallback = Rc<dyn Fn(ZoneShape)>;

/// Application-side callbacks, keyed by entity id.
pub type MarkerMovedCallback = Rc<dyn Fn(&str, Point)>;
pub type ZoneEditedCallback = Rc<dyn Fn(&str, ZoneShape)>;

/// Bridge to one live provider SDK map instance.
///
/// Arguments and return values are `serde_json::Value`s in the provider's
/// own encoding; `NativeObject::to_value` produces references to other
/// native objects. Implementations are single-threaded and must not hold
/// internal borrows while invoking listeners or deferred tasks.
pub trait NativeMap {
    fn provider(&self) -> ProviderId;

    /// The map instance itself, used as the target for map-wide calls.
    fn map_object(&self) -> NativeObject;

    fn construct(&self, class: &str, args: Vec<Value>) -> Result<NativeObject>;

    fn call(&self, target: NativeObject, method: &str, args: Vec<Value>) -> Result<Value>;

    fn listen(&self, target: NativeObject, event: &str, listener: NativeListener) -> Result<ListenerId>;

    fn unlisten(&self, listener: ListenerId);

    /// Runs `task` after the SDK event queue has had one tick to flush.
    fn defer(&self, task: Box<dyn FnOnce()>);
}

pub trait MarkerAdapter {
    fn mount(
        &self,
        context: &MapContext,
        marker: &MarkerDescriptor,
        on_drag_end: DragEndCallback,
    ) -> Result<NativeHandle>;

    /// Idempotent.
    fn unmount(&self, handle: &NativeHandle);

    fn update_visual(&self, handle: &NativeHandle, marker: &MarkerDescriptor) -> Result<UpdateOutcome>;

    fn update_position(&self, handle: &NativeHandle, position: Point) -> Result<()>;

    fn subscribe_map_click(&self, context: &MapContext, callback: MapClickCallback) -> Result<Subscription>;
}

pub trait ZoneAdapter {
    fn mount(
        &self,
        context: &MapContext,
        zone: &ZoneDescriptor,
        on_edit_end: EditEndCallback,
    ) -> Result<NativeHandle>;

    /// Idempotent.
    fn unmount(&self, handle: &NativeHandle);

    /// Programmatic update; never reported back through `on_edit_end`.
    fn update(&self, handle: &NativeHandle, zone: &ZoneDescriptor) -> Result<UpdateOutcome>;

    fn set_editable(&self, handle: &NativeHandle, editable: bool) -> Result<Capability>;

    fn edit_mode(&self) -> EditMode;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, provider: ProviderId, address: &str) -> Vec<GeoObject>;

    async fn reverse_geocode(&self, provider: ProviderId, position: Point) -> Vec<GeoObject>;
}
