use crate::adapters::google::{GoogleMarkerAdapter, GoogleZoneAdapter};
use crate::adapters::twogis::{TwoGisMarkerAdapter, TwoGisZoneAdapter};
use crate::adapters::yandex::{YandexMarkerAdapter, YandexZoneAdapter};
use crate::core::context::MapContext;
use crate::domain::model::{MarkerDescriptor, Point, ProviderId, ZoneDescriptor};
use crate::domain::native::{Capability, EditMode, NativeHandle, Subscription, UpdateOutcome};
use crate::domain::ports::{DragEndCallback, EditEndCallback, MapClickCallback, MarkerAdapter, ZoneAdapter};
use crate::utils::error::{GeoError, Result};
use std::collections::BTreeMap;

/// Provider-keyed adapter table shared by both engines.
struct Registry<A: ?Sized> {
    kind: &'static str,
    adapters: BTreeMap<ProviderId, Box<A>>,
}

impl<A: ?Sized> Registry<A> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            adapters: BTreeMap::new(),
        }
    }

    fn register(&mut self, provider: ProviderId, adapter: Box<A>) {
        if self.adapters.insert(provider, adapter).is_some() {
            tracing::debug!("Replaced {} adapter for {}", self.kind, provider);
        } else {
            tracing::debug!("Registered {} adapter for {}", self.kind, provider);
        }
    }

    fn get(&self, provider: ProviderId) -> Result<&A> {
        self.adapters
            .get(&provider)
            .map(|adapter| &**adapter)
            .ok_or(GeoError::UnregisteredProvider {
                kind: self.kind,
                provider,
            })
    }

    fn providers(&self) -> Vec<ProviderId> {
        self.adapters.keys().copied().collect()
    }
}

/// Routes marker operations to the adapter registered for a provider.
pub struct MarkerEngine {
    registry: Registry<dyn MarkerAdapter>,
}

impl Default for MarkerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerEngine {
    /// An engine with no adapters; every call fails until one is registered.
    pub fn new() -> Self {
        Self {
            registry: Registry::new("marker"),
        }
    }

    pub fn with_default_adapters() -> Self {
        let mut engine = Self::new();
        engine.register_adapter(ProviderId::Yandex, YandexMarkerAdapter);
        engine.register_adapter(ProviderId::Google, GoogleMarkerAdapter);
        engine.register_adapter(ProviderId::TwoGis, TwoGisMarkerAdapter);
        engine
    }

    /// Later registrations for the same provider replace earlier ones.
    pub fn register_adapter(&mut self, provider: ProviderId, adapter: impl MarkerAdapter + 'static) {
        self.registry.register(provider, Box::new(adapter));
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        self.registry.providers()
    }

    pub fn ensure_registered(&self, provider: ProviderId) -> Result<()> {
        self.registry.get(provider).map(|_| ())
    }

    pub fn mount(
        &self,
        provider: ProviderId,
        context: &MapContext,
        marker: &MarkerDescriptor,
        on_drag_end: DragEndCallback,
    ) -> Result<NativeHandle> {
        self.registry.get(provider)?.mount(context, marker, on_drag_end)
    }

    pub fn unmount(&self, provider: ProviderId, handle: &NativeHandle) -> Result<()> {
        self.registry.get(provider)?.unmount(handle);
        Ok(())
    }

    pub fn update_visual(
        &self,
        provider: ProviderId,
        handle: &NativeHandle,
        marker: &MarkerDescriptor,
    ) -> Result<UpdateOutcome> {
        self.registry.get(provider)?.update_visual(handle, marker)
    }

    pub fn update_position(&self, provider: ProviderId, handle: &NativeHandle, position: Point) -> Result<()> {
        self.registry.get(provider)?.update_position(handle, position)
    }

    pub fn subscribe_map_click(
        &self,
        provider: ProviderId,
        context: &MapContext,
        callback: MapClickCallback,
    ) -> Result<Subscription> {
        self.registry.get(provider)?.subscribe_map_click(context, callback)
    }
}

/// Routes zone operations to the adapter registered for a provider.
pub struct ZoneEngine {
    registry: Registry<dyn ZoneAdapter>,
}

impl Default for ZoneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneEngine {
    pub fn new() -> Self {
        Self {
            registry: Registry::new("zone"),
        }
    }

    /// Built-in adapters; 2GIS circles use `circle_segments` sides.
    pub fn with_default_adapters(circle_segments: usize) -> Self {
        let mut engine = Self::new();
        engine.register_adapter(ProviderId::Yandex, YandexZoneAdapter);
        engine.register_adapter(ProviderId::Google, GoogleZoneAdapter);
        engine.register_adapter(ProviderId::TwoGis, TwoGisZoneAdapter::new(circle_segments));
        engine
    }

    pub fn register_adapter(&mut self, provider: ProviderId, adapter: impl ZoneAdapter + 'static) {
        self.registry.register(provider, Box::new(adapter));
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        self.registry.providers()
    }

    pub fn ensure_registered(&self, provider: ProviderId) -> Result<()> {
        self.registry.get(provider).map(|_| ())
    }

    pub fn mount(
        &self,
        provider: ProviderId,
        context: &MapContext,
        zone: &ZoneDescriptor,
        on_edit_end: EditEndCallback,
    ) -> Result<NativeHandle> {
        self.registry.get(provider)?.mount(context, zone, on_edit_end)
    }

    pub fn unmount(&self, provider: ProviderId, handle: &NativeHandle) -> Result<()> {
        self.registry.get(provider)?.unmount(handle);
        Ok(())
    }

    pub fn update(&self, provider: ProviderId, handle: &NativeHandle, zone: &ZoneDescriptor) -> Result<UpdateOutcome> {
        self.registry.get(provider)?.update(handle, zone)
    }

    pub fn set_editable(&self, provider: ProviderId, handle: &NativeHandle, editable: bool) -> Result<Capability> {
        self.registry.get(provider)?.set_editable(handle, editable)
    }

    pub fn edit_mode(&self, provider: ProviderId) -> Result<EditMode> {
        Ok(self.registry.get(provider)?.edit_mode())
    }
}
