// Adapters layer: per-provider marker and zone adapters over the NativeMap
// bridge, coordinate converters, the headless bridge, and the HTTP geocoder.

pub mod convert;
pub mod geocode;
pub mod google;
pub mod headless;
pub mod twogis;
pub mod yandex;

use crate::core::context::MapContext;
use crate::domain::model::{MapView, Point, ProviderId, ZoneDescriptor, ZoneKind, ZoneShape};
use crate::domain::native::{NativeHandle, NativeObject, Subscription, UpdateGuard};
use crate::domain::ports::{EditEndCallback, MapClickCallback, NativeListener, NativeMap};
use crate::utils::error::{GeoError, Result};
use convert::{CoordinateCodec, LatLngArray, LatLngLiteral, LngLatArray};
use serde_json::json;
use std::rc::{Rc, Weak};

pub(crate) fn ensure_live(handle: &NativeHandle) -> Result<()> {
    if handle.is_disposed() {
        return Err(GeoError::native(format!("native object for '{}' was disposed", handle.id)));
    }
    Ok(())
}

pub(crate) fn ensure_kind(handle: &NativeHandle, zone: &ZoneDescriptor) -> Result<()> {
    match handle.kind {
        Some(kind) if kind != zone.kind() => Err(GeoError::invalid_descriptor(
            &zone.id,
            format!("shape changed from {} to {}; remount required", kind, zone.kind()),
        )),
        _ => Ok(()),
    }
}

/// Applies a code-originated mutation under the handle's loop guard.
pub(crate) fn guarded(
    handle: &NativeHandle,
    mutation: impl FnOnce(&dyn NativeMap, NativeObject) -> Result<()>,
) -> Result<()> {
    ensure_live(handle)?;
    let map = handle.map.as_ref();
    handle.guard.run(map, || mutation(map, handle.object))
}

/// Finishes wiring a freshly constructed object. When a step fails the
/// object is disposed with `destroy` before the error is returned.
pub(crate) fn wire_or_dispose(
    handle: NativeHandle,
    destroy: fn(&dyn NativeMap, NativeObject) -> Result<()>,
    wire: impl FnOnce(&NativeHandle) -> Result<()>,
) -> Result<NativeHandle> {
    match wire(&handle) {
        Ok(()) => Ok(handle),
        Err(e) => {
            tracing::debug!("Disposing half-mounted object for '{}': {}", handle.id, e);
            handle.dispose(destroy);
            Err(e)
        }
    }
}

/// Moves the map camera, encoding the center in the provider's order.
pub(crate) fn apply_view(map: &dyn NativeMap, view: &MapView) -> Result<()> {
    match map.provider() {
        ProviderId::Yandex => set_view::<LatLngArray>(map, view),
        ProviderId::Google => set_view::<LatLngLiteral>(map, view),
        ProviderId::TwoGis => set_view::<LngLatArray>(map, view),
    }
}

fn set_view<C: CoordinateCodec>(map: &dyn NativeMap, view: &MapView) -> Result<()> {
    let target = map.map_object();
    if let Some(center) = view.center {
        map.call(target, "setCenter", vec![C::to_native(center)])?;
    }
    if let Some(zoom) = view.zoom {
        map.call(target, "setZoom", vec![json!(zoom)])?;
    }
    tracing::debug!("[{}] view set to {:?}", map.provider(), view);
    Ok(())
}

pub(crate) fn subscribe_click<C: CoordinateCodec>(
    context: &MapContext,
    payload_key: &'static str,
    callback: MapClickCallback,
) -> Result<Subscription> {
    let map = context.native()?;
    let provider = map.provider();
    let listener = map.listen(
        map.map_object(),
        "click",
        Rc::new(move |event| match event.get(payload_key).and_then(C::from_native) {
            Some(point) => {
                tracing::debug!("[{}] map clicked at {:?}", provider, point);
                callback(point)
            }
            None => tracing::warn!("[{}] click event without usable '{}'", provider, payload_key),
        }),
    )?;
    tracing::debug!("[{}] subscribed to map clicks", provider);
    Ok(Subscription::new(&map, listener))
}

/// Reads a point back from the native object after a user gesture.
pub(crate) fn read_point<C: CoordinateCodec>(
    map: &Weak<dyn NativeMap>,
    object: NativeObject,
    method: &str,
) -> Option<Point> {
    let map = map.upgrade()?;
    match map.call(object, method, Vec::new()) {
        Ok(value) => C::from_native(&value),
        Err(e) => {
            tracing::warn!("Failed to read {} from native object: {}", method, e);
            None
        }
    }
}

pub(crate) type ShapeReader = fn(&dyn NativeMap, NativeObject, ZoneKind) -> Option<ZoneShape>;

/// Listener for native geometry edits; silent while the guard is raised.
pub(crate) fn edit_listener(
    guard: UpdateGuard,
    map: Weak<dyn NativeMap>,
    object: NativeObject,
    kind: ZoneKind,
    read: ShapeReader,
    on_edit_end: EditEndCallback,
) -> NativeListener {
    Rc::new(move |_event| {
        if guard.is_active() {
            return;
        }
        let Some(map) = map.upgrade() else {
            return;
        };
        match read(map.as_ref(), object, kind) {
            Some(shape) => on_edit_end(shape),
            None => tracing::warn!("Edited {} geometry could not be decoded", kind),
        }
    })
}
