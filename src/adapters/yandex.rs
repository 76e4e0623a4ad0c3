//! Yandex Maps adapters. Coordinates are `[lat, lng]`; objects join the map
//! through `map.geoObjects` and shapes carry a shared `editor` whose
//! sessions are coordinated centrally.

use super::convert::{CoordinateCodec, LatLngArray};
use super::{edit_listener, ensure_kind, guarded, read_point, subscribe_click, wire_or_dispose};
use crate::core::context::MapContext;
use crate::domain::model::{MarkerDescriptor, MarkerMeta, Point, ZoneDescriptor, ZoneKind, ZoneShape};
use crate::domain::native::{Capability, EditMode, NativeHandle, NativeObject, Subscription, UpdateGuard, UpdateOutcome};
use crate::domain::ports::{DragEndCallback, EditEndCallback, MapClickCallback, MarkerAdapter, NativeMap, ZoneAdapter};
use crate::utils::error::Result;
use serde_json::{json, Value};
use std::rc::Rc;

fn add_to_map(map: &dyn NativeMap, object: NativeObject) -> Result<()> {
    map.call(map.map_object(), "geoObjects.add", vec![object.to_value()])
        .map(|_| ())
}

fn remove_from_map(map: &dyn NativeMap, object: NativeObject) -> Result<()> {
    map.call(map.map_object(), "geoObjects.remove", vec![object.to_value()])
        .map(|_| ())
}

fn placemark_properties(meta: &MarkerMeta) -> Value {
    json!({
        "hintContent": meta.title.as_deref().or(meta.address.as_deref()),
        "balloonContent": meta.description.as_deref().or(meta.address.as_deref()),
        "iconContent": meta.visible_label(),
    })
}

fn placemark_options(meta: &MarkerMeta) -> Value {
    let draggable = meta.is_draggable();
    match (&meta.icon, meta.visible_label()) {
        (Some(icon), _) => {
            let (anchor_x, anchor_y) = icon.anchor();
            json!({
                "draggable": draggable,
                "preset": null,
                "iconLayout": "default#image",
                "iconImageHref": icon.url,
                "iconImageSize": [icon.width, icon.height],
                "iconImageOffset": [-anchor_x, -anchor_y],
            })
        }
        (None, label) => json!({
            "draggable": draggable,
            "preset": if label.is_some() { "islands#blueStretchyIcon" } else { "islands#blueIcon" },
            "iconLayout": null,
            "iconImageHref": null,
        }),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YandexMarkerAdapter;

impl MarkerAdapter for YandexMarkerAdapter {
    fn mount(
        &self,
        context: &MapContext,
        marker: &MarkerDescriptor,
        on_drag_end: DragEndCallback,
    ) -> Result<NativeHandle> {
        let map = context.native()?;
        tracing::debug!("[yandex] mounting marker {}", marker.id);

        let placemark = map.construct(
            "Placemark",
            vec![
                LatLngArray::to_native(marker.position),
                placemark_properties(&marker.meta),
                placemark_options(&marker.meta),
            ],
        )?;
        let guard = UpdateGuard::default();
        let handle = NativeHandle::marker(&marker.id, Rc::clone(&map), placemark, guard.clone(), Rc::clone(&on_drag_end));

        wire_or_dispose(handle, remove_from_map, |handle| {
            let weak = handle.weak_map();
            let listener = map.listen(
                placemark,
                "dragend",
                Rc::new(move |_| {
                    if guard.is_active() {
                        return;
                    }
                    if let Some(point) = read_point::<LatLngArray>(&weak, placemark, "geometry.getCoordinates") {
                        on_drag_end(point);
                    }
                }),
            )?;
            handle.track(listener);
            add_to_map(map.as_ref(), placemark)
        })
    }

    fn unmount(&self, handle: &NativeHandle) {
        tracing::debug!("[yandex] unmounting marker {}", handle.id());
        handle.dispose(remove_from_map);
    }

    fn update_visual(&self, handle: &NativeHandle, marker: &MarkerDescriptor) -> Result<UpdateOutcome> {
        guarded(handle, |map, placemark| {
            map.call(placemark, "properties.set", vec![placemark_properties(&marker.meta)])?;
            map.call(placemark, "options.set", vec![placemark_options(&marker.meta)])?;
            Ok(())
        })?;
        Ok(UpdateOutcome::Mutated)
    }

    fn update_position(&self, handle: &NativeHandle, position: Point) -> Result<()> {
        guarded(handle, |map, placemark| {
            map.call(placemark, "geometry.setCoordinates", vec![LatLngArray::to_native(position)])
                .map(|_| ())
        })
    }

    fn subscribe_map_click(&self, context: &MapContext, callback: MapClickCallback) -> Result<Subscription> {
        subscribe_click::<LatLngArray>(context, "coords", callback)
    }
}

fn zone_class(kind: ZoneKind) -> &'static str {
    match kind {
        ZoneKind::Circle => "Circle",
        ZoneKind::Polygon | ZoneKind::Rectangle => "Polygon",
        ZoneKind::Polyline => "Polyline",
    }
}

fn zone_geometry(shape: &ZoneShape) -> Value {
    match shape {
        ZoneShape::Circle { center, radius } => json!([LatLngArray::to_native(*center), radius]),
        // Polygons take a list of contours; only the outer one is used.
        ZoneShape::Polygon { points } | ZoneShape::Rectangle { points } => {
            json!([LatLngArray::path_to_native(points)])
        }
        ZoneShape::Polyline { points } => LatLngArray::path_to_native(points),
    }
}

fn zone_properties(zone: &ZoneDescriptor) -> Value {
    json!({
        "hintContent": zone.meta.title,
        "balloonContent": zone.meta.description.as_ref().or(zone.meta.title.as_ref()),
    })
}

fn zone_options(zone: &ZoneDescriptor) -> Value {
    let style = &zone.style;
    match zone.kind() {
        ZoneKind::Polyline => json!({
            "strokeColor": style.stroke_color.as_deref().unwrap_or("#0066ff"),
            "strokeWidth": style.stroke_width.unwrap_or(4.0),
            "strokeOpacity": style.stroke_opacity.unwrap_or(0.8),
        }),
        _ => json!({
            "fillColor": style.fill_color.as_deref().unwrap_or("#0066ff99"),
            "fillOpacity": style.fill_opacity.unwrap_or(1.0),
            "strokeColor": style.stroke_color.as_deref().unwrap_or("#0066ff"),
            "strokeOpacity": style.stroke_opacity.unwrap_or(0.8),
            "strokeWidth": style.stroke_width.unwrap_or(3.0),
        }),
    }
}

fn read_zone(map: &dyn NativeMap, object: NativeObject, kind: ZoneKind) -> Option<ZoneShape> {
    let coords = map.call(object, "geometry.getCoordinates", Vec::new()).ok()?;
    match kind {
        ZoneKind::Circle => {
            let center = LatLngArray::from_native(&coords)?;
            let radius = map.call(object, "geometry.getRadius", Vec::new()).ok()?.as_f64()?;
            Some(ZoneShape::circle(center, radius))
        }
        ZoneKind::Polygon | ZoneKind::Rectangle => {
            let outer = coords.as_array()?.first()?;
            ZoneShape::from_path(kind, LatLngArray::path_from_native(outer)?)
        }
        ZoneKind::Polyline => ZoneShape::from_path(kind, LatLngArray::path_from_native(&coords)?),
    }
}

fn set_editor(handle: &NativeHandle, editable: bool) -> Result<()> {
    if handle.editing.get() == editable {
        return Ok(());
    }
    let method = if editable { "editor.startEditing" } else { "editor.stopEditing" };
    handle.map.call(handle.object, method, Vec::new())?;
    handle.editing.set(editable);
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YandexZoneAdapter;

impl ZoneAdapter for YandexZoneAdapter {
    fn mount(
        &self,
        context: &MapContext,
        zone: &ZoneDescriptor,
        on_edit_end: EditEndCallback,
    ) -> Result<NativeHandle> {
        let map = context.native()?;
        let kind = zone.kind();
        tracing::debug!("[yandex] mounting {} zone {}", kind, zone.id);

        let object = map.construct(
            zone_class(kind),
            vec![zone_geometry(&zone.shape), zone_properties(zone), zone_options(zone)],
        )?;
        let guard = UpdateGuard::default();
        let handle = NativeHandle::zone(&zone.id, kind, Rc::clone(&map), object, guard.clone(), Rc::clone(&on_edit_end));
        wire_or_dispose(handle, remove_from_map, |handle| {
            add_to_map(map.as_ref(), object)?;
            let listener = map.listen(
                object,
                "editor.geometrychange",
                edit_listener(guard, handle.weak_map(), object, kind, read_zone, on_edit_end),
            )?;
            handle.track(listener);
            if zone.editable {
                set_editor(handle, true)?;
            }
            Ok(())
        })
    }

    fn unmount(&self, handle: &NativeHandle) {
        tracing::debug!("[yandex] unmounting zone {}", handle.id());
        if !handle.is_disposed() {
            if let Err(e) = set_editor(handle, false) {
                tracing::warn!("[yandex] failed to stop editor for {}: {}", handle.id(), e);
            }
        }
        handle.dispose(remove_from_map);
    }

    fn update(&self, handle: &NativeHandle, zone: &ZoneDescriptor) -> Result<UpdateOutcome> {
        ensure_kind(handle, zone)?;
        guarded(handle, |map, object| {
            match &zone.shape {
                ZoneShape::Circle { center, radius } => {
                    map.call(object, "geometry.setCoordinates", vec![LatLngArray::to_native(*center)])?;
                    map.call(object, "geometry.setRadius", vec![json!(radius)])?;
                }
                ZoneShape::Polygon { points } | ZoneShape::Rectangle { points } => {
                    map.call(object, "geometry.setCoordinates", vec![json!([LatLngArray::path_to_native(points)])])?;
                }
                ZoneShape::Polyline { points } => {
                    map.call(object, "geometry.setCoordinates", vec![LatLngArray::path_to_native(points)])?;
                }
            }
            map.call(object, "options.set", vec![zone_options(zone)])?;
            map.call(object, "properties.set", vec![zone_properties(zone)])?;
            Ok(())
        })?;
        Ok(UpdateOutcome::Mutated)
    }

    fn set_editable(&self, handle: &NativeHandle, editable: bool) -> Result<Capability> {
        super::ensure_live(handle)?;
        set_editor(handle, editable)?;
        Ok(Capability::Applied)
    }

    fn edit_mode(&self) -> EditMode {
        EditMode::Centralized
    }
}
