//! Google Maps adapters. Coordinates are `{lat, lng}` literals; objects
//! attach through their `map` option, and every shape has its own editor.

use super::convert::{CoordinateCodec, LatLngLiteral};
use super::{edit_listener, ensure_kind, ensure_live, guarded, read_point, subscribe_click, wire_or_dispose};
use crate::core::context::MapContext;
use crate::domain::model::{MarkerDescriptor, MarkerMeta, Point, ZoneDescriptor, ZoneKind, ZoneShape};
use crate::domain::native::{Capability, EditMode, NativeHandle, NativeObject, Subscription, UpdateGuard, UpdateOutcome};
use crate::domain::ports::{DragEndCallback, EditEndCallback, MapClickCallback, MarkerAdapter, NativeMap, ZoneAdapter};
use crate::utils::error::Result;
use serde_json::{json, Map, Value};
use std::rc::Rc;

const DEFAULT_COLOR: &str = "#FF0000";

fn detach(map: &dyn NativeMap, object: NativeObject) -> Result<()> {
    map.call(object, "setMap", vec![Value::Null]).map(|_| ())
}

fn marker_icon(meta: &MarkerMeta) -> Value {
    match &meta.icon {
        Some(icon) => {
            let (x, y) = icon.anchor();
            json!({
                "url": icon.url,
                "scaledSize": { "width": icon.width, "height": icon.height },
                "anchor": { "x": x, "y": y },
            })
        }
        None => Value::Null,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleMarkerAdapter;

impl MarkerAdapter for GoogleMarkerAdapter {
    fn mount(
        &self,
        context: &MapContext,
        marker: &MarkerDescriptor,
        on_drag_end: DragEndCallback,
    ) -> Result<NativeHandle> {
        let map = context.native()?;
        tracing::debug!("[google] mounting marker {}", marker.id);

        let object = map.construct(
            "Marker",
            vec![json!({
                "map": map.map_object().to_value(),
                "position": LatLngLiteral::to_native(marker.position),
                "title": marker.meta.title,
                "label": marker.meta.visible_label(),
                "icon": marker_icon(&marker.meta),
                "draggable": marker.meta.is_draggable(),
            })],
        )?;
        let guard = UpdateGuard::default();
        let handle = NativeHandle::marker(&marker.id, Rc::clone(&map), object, guard.clone(), Rc::clone(&on_drag_end));

        wire_or_dispose(handle, detach, |handle| {
            let weak = handle.weak_map();
            let listener = map.listen(
                object,
                "dragend",
                Rc::new(move |event| {
                    if guard.is_active() {
                        return;
                    }
                    let point = event
                        .get("latLng")
                        .and_then(LatLngLiteral::from_native)
                        .or_else(|| read_point::<LatLngLiteral>(&weak, object, "getPosition"));
                    if let Some(point) = point {
                        on_drag_end(point);
                    }
                }),
            )?;
            handle.track(listener);
            Ok(())
        })
    }

    fn unmount(&self, handle: &NativeHandle) {
        tracing::debug!("[google] unmounting marker {}", handle.id());
        handle.dispose(detach);
    }

    fn update_visual(&self, handle: &NativeHandle, marker: &MarkerDescriptor) -> Result<UpdateOutcome> {
        let meta = &marker.meta;
        guarded(handle, |map, object| {
            map.call(object, "setTitle", vec![json!(meta.title)])?;
            map.call(object, "setLabel", vec![json!(meta.visible_label())])?;
            map.call(object, "setIcon", vec![marker_icon(meta)])?;
            map.call(object, "setDraggable", vec![json!(meta.is_draggable())])?;
            Ok(())
        })?;
        Ok(UpdateOutcome::Mutated)
    }

    fn update_position(&self, handle: &NativeHandle, position: Point) -> Result<()> {
        guarded(handle, |map, object| {
            map.call(object, "setPosition", vec![LatLngLiteral::to_native(position)])
                .map(|_| ())
        })
    }

    fn subscribe_map_click(&self, context: &MapContext, callback: MapClickCallback) -> Result<Subscription> {
        subscribe_click::<LatLngLiteral>(context, "latLng", callback)
    }
}

fn shape_options(zone: &ZoneDescriptor) -> Map<String, Value> {
    let style = &zone.style;
    let mut options = Map::new();
    options.insert("strokeColor".into(), json!(style.stroke_color.as_deref().unwrap_or(DEFAULT_COLOR)));
    options.insert("strokeOpacity".into(), json!(style.stroke_opacity.unwrap_or(0.8)));
    options.insert("strokeWeight".into(), json!(style.stroke_width.unwrap_or(2.0)));
    if zone.kind() != ZoneKind::Polyline {
        options.insert("fillColor".into(), json!(style.fill_color.as_deref().unwrap_or(DEFAULT_COLOR)));
        options.insert("fillOpacity".into(), json!(style.fill_opacity.unwrap_or(0.35)));
    }
    options
}

fn geometry_fields(shape: &ZoneShape) -> Map<String, Value> {
    let mut fields = Map::new();
    match shape {
        ZoneShape::Circle { center, radius } => {
            fields.insert("center".into(), LatLngLiteral::to_native(*center));
            fields.insert("radius".into(), json!(radius));
        }
        ZoneShape::Polygon { points } | ZoneShape::Rectangle { points } => {
            fields.insert("paths".into(), LatLngLiteral::path_to_native(points));
        }
        ZoneShape::Polyline { points } => {
            fields.insert("path".into(), LatLngLiteral::path_to_native(points));
        }
    }
    fields
}

fn zone_class(kind: ZoneKind) -> &'static str {
    match kind {
        ZoneKind::Circle => "Circle",
        ZoneKind::Polygon | ZoneKind::Rectangle => "Polygon",
        ZoneKind::Polyline => "Polyline",
    }
}

fn edit_events(kind: ZoneKind) -> &'static [&'static str] {
    match kind {
        ZoneKind::Circle => &["center_changed", "radius_changed"],
        _ => &["path.set_at", "path.insert_at", "path.remove_at"],
    }
}

fn read_zone(map: &dyn NativeMap, object: NativeObject, kind: ZoneKind) -> Option<ZoneShape> {
    match kind {
        ZoneKind::Circle => {
            let center = LatLngLiteral::from_native(&map.call(object, "getCenter", Vec::new()).ok()?)?;
            let radius = map.call(object, "getRadius", Vec::new()).ok()?.as_f64()?;
            Some(ZoneShape::circle(center, radius))
        }
        ZoneKind::Polygon | ZoneKind::Rectangle => {
            let paths = map.call(object, "getPaths", Vec::new()).ok()?;
            ZoneShape::from_path(kind, LatLngLiteral::path_from_native(&paths)?)
        }
        ZoneKind::Polyline => {
            let path = map.call(object, "getPath", Vec::new()).ok()?;
            ZoneShape::from_path(kind, LatLngLiteral::path_from_native(&path)?)
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleZoneAdapter;

impl ZoneAdapter for GoogleZoneAdapter {
    fn mount(
        &self,
        context: &MapContext,
        zone: &ZoneDescriptor,
        on_edit_end: EditEndCallback,
    ) -> Result<NativeHandle> {
        let map = context.native()?;
        let kind = zone.kind();
        tracing::debug!("[google] mounting {} zone {}", kind, zone.id);

        let mut options = shape_options(zone);
        options.extend(geometry_fields(&zone.shape));
        options.insert("editable".into(), json!(zone.editable));
        options.insert("map".into(), map.map_object().to_value());

        let object = map.construct(zone_class(kind), vec![Value::Object(options)])?;
        let guard = UpdateGuard::default();
        let handle = NativeHandle::zone(&zone.id, kind, Rc::clone(&map), object, guard.clone(), Rc::clone(&on_edit_end));
        handle.editing.set(zone.editable);

        let listener = edit_listener(guard, handle.weak_map(), object, kind, read_zone, on_edit_end);
        wire_or_dispose(handle, detach, |handle| {
            for event in edit_events(kind) {
                handle.track(map.listen(object, event, Rc::clone(&listener))?);
            }
            Ok(())
        })
    }

    fn unmount(&self, handle: &NativeHandle) {
        tracing::debug!("[google] unmounting zone {}", handle.id());
        if handle.is_editing() && !handle.is_disposed() {
            if let Err(e) = handle.map.call(handle.object, "setEditable", vec![json!(false)]) {
                tracing::warn!("[google] failed to stop editing {}: {}", handle.id(), e);
            }
        }
        handle.dispose(detach);
    }

    fn update(&self, handle: &NativeHandle, zone: &ZoneDescriptor) -> Result<UpdateOutcome> {
        ensure_kind(handle, zone)?;
        guarded(handle, |map, object| {
            match &zone.shape {
                ZoneShape::Circle { center, radius } => {
                    map.call(object, "setCenter", vec![LatLngLiteral::to_native(*center)])?;
                    map.call(object, "setRadius", vec![json!(radius)])?;
                }
                ZoneShape::Polygon { points } | ZoneShape::Rectangle { points } => {
                    map.call(object, "setPaths", vec![LatLngLiteral::path_to_native(points)])?;
                }
                ZoneShape::Polyline { points } => {
                    map.call(object, "setPath", vec![LatLngLiteral::path_to_native(points)])?;
                }
            }
            map.call(object, "setOptions", vec![Value::Object(shape_options(zone))])?;
            Ok(())
        })?;
        Ok(UpdateOutcome::Mutated)
    }

    fn set_editable(&self, handle: &NativeHandle, editable: bool) -> Result<Capability> {
        ensure_live(handle)?;
        if handle.is_editing() != editable {
            handle.map.call(handle.object, "setEditable", vec![json!(editable)])?;
            handle.editing.set(editable);
        }
        Ok(Capability::Applied)
    }

    fn edit_mode(&self) -> EditMode {
        EditMode::PerEntity
    }
}
