//! 2GIS MapGL adapters. Coordinates are `[lng, lat]`. The SDK has no
//! circle primitive and no vertex editor, and its objects cannot be restyled
//! in place, so visual updates rebuild the native object.

use super::convert::{circle_to_polygon, hex_to_rgba, CoordinateCodec, LngLatArray, DEFAULT_CIRCLE_SEGMENTS};
use super::{ensure_kind, ensure_live, guarded, read_point, subscribe_click, wire_or_dispose};
use crate::core::context::MapContext;
use crate::domain::model::{MarkerDescriptor, Point, ZoneDescriptor, ZoneShape};
use crate::domain::native::{Capability, EditMode, NativeHandle, NativeObject, Subscription, UpdateGuard, UpdateOutcome};
use crate::domain::ports::{DragEndCallback, EditEndCallback, MapClickCallback, MarkerAdapter, NativeMap, ZoneAdapter};
use crate::utils::error::{GeoError, Result};
use serde_json::{json, Map, Value};
use std::rc::Rc;

fn destroy(map: &dyn NativeMap, object: NativeObject) -> Result<()> {
    map.call(object, "destroy", Vec::new()).map(|_| ())
}

fn marker_options(marker: &MarkerDescriptor) -> Value {
    let meta = &marker.meta;
    let mut options = Map::new();
    options.insert("coordinates".into(), LngLatArray::to_native(marker.position));
    options.insert("draggable".into(), json!(meta.is_draggable()));
    if let Some(icon) = &meta.icon {
        let (x, y) = icon.anchor();
        options.insert("icon".into(), json!(icon.url));
        options.insert("size".into(), json!([icon.width, icon.height]));
        options.insert("anchor".into(), json!([x, y]));
    }
    if let Some(text) = meta.visible_label() {
        options.insert(
            "label".into(),
            json!({ "text": text, "fontSize": 14, "haloRadius": 1, "haloColor": "#fff" }),
        );
    }
    if let Some(title) = &meta.title {
        options.insert("hint".into(), json!(title));
    }
    Value::Object(options)
}

fn build_marker(map: Rc<dyn NativeMap>, marker: &MarkerDescriptor, on_drag_end: DragEndCallback) -> Result<NativeHandle> {
    let object = map.construct("Marker", vec![map.map_object().to_value(), marker_options(marker)])?;
    let guard = UpdateGuard::default();
    let handle = NativeHandle::marker(&marker.id, Rc::clone(&map), object, guard.clone(), Rc::clone(&on_drag_end));

    wire_or_dispose(handle, destroy, |handle| {
        let weak = handle.weak_map();
        let listener = map.listen(
            object,
            "dragend",
            Rc::new(move |_| {
                if guard.is_active() {
                    return;
                }
                if let Some(point) = read_point::<LngLatArray>(&weak, object, "getCoordinates") {
                    on_drag_end(point);
                }
            }),
        )?;
        handle.track(listener);
        Ok(())
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TwoGisMarkerAdapter;

impl MarkerAdapter for TwoGisMarkerAdapter {
    fn mount(
        &self,
        context: &MapContext,
        marker: &MarkerDescriptor,
        on_drag_end: DragEndCallback,
    ) -> Result<NativeHandle> {
        tracing::debug!("[2gis] mounting marker {}", marker.id);
        build_marker(context.native()?, marker, on_drag_end)
    }

    fn unmount(&self, handle: &NativeHandle) {
        tracing::debug!("[2gis] unmounting marker {}", handle.id());
        handle.dispose(destroy);
    }

    fn update_visual(&self, handle: &NativeHandle, marker: &MarkerDescriptor) -> Result<UpdateOutcome> {
        ensure_live(handle)?;
        let on_drag_end = handle
            .on_drag_end
            .clone()
            .ok_or_else(|| GeoError::native(format!("'{}' is not a marker handle", handle.id())))?;
        // Build the replacement first so a failure leaves the old one in place.
        let replacement = build_marker(Rc::clone(&handle.map), marker, on_drag_end)?;
        tracing::debug!("[2gis] marker {} rebuilt for visual update", marker.id);
        handle.dispose(destroy);
        Ok(UpdateOutcome::Replaced(replacement))
    }

    fn update_position(&self, handle: &NativeHandle, position: Point) -> Result<()> {
        guarded(handle, |map, object| {
            map.call(object, "setCoordinates", vec![LngLatArray::to_native(position)])
                .map(|_| ())
        })
    }

    fn subscribe_map_click(&self, context: &MapContext, callback: MapClickCallback) -> Result<Subscription> {
        subscribe_click::<LngLatArray>(context, "lngLat", callback)
    }
}

/// Zone adapter; circles are rendered as polygons of `circle_segments` sides.
#[derive(Debug, Clone, Copy)]
pub struct TwoGisZoneAdapter {
    circle_segments: usize,
}

impl Default for TwoGisZoneAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_CIRCLE_SEGMENTS)
    }
}

impl TwoGisZoneAdapter {
    pub fn new(circle_segments: usize) -> Self {
        Self { circle_segments }
    }

    pub fn circle_segments(&self) -> usize {
        self.circle_segments
    }

    fn zone_options(&self, map: &dyn NativeMap, zone: &ZoneDescriptor) -> (&'static str, Value) {
        let style = &zone.style;
        let mut options = Map::new();
        options.insert("map".into(), map.map_object().to_value());
        let class = match &zone.shape {
            ZoneShape::Polyline { points } => {
                options.insert("coordinates".into(), LngLatArray::path_to_native(points));
                options.insert("color".into(), json!(style.stroke_color.as_deref().unwrap_or("#0000ff")));
                options.insert("width".into(), json!(style.stroke_width.unwrap_or(3.0)));
                "Polyline"
            }
            shape => {
                let ring = match shape {
                    ZoneShape::Circle { center, radius } => circle_to_polygon(*center, *radius, self.circle_segments),
                    other => other.points().map(<[Point]>::to_vec).unwrap_or_default(),
                };
                options.insert("coordinates".into(), json!([LngLatArray::path_to_native(&ring)]));
                options.insert(
                    "color".into(),
                    json!(hex_to_rgba(
                        Some(style.fill_color.as_deref().unwrap_or("#ff000033")),
                        style.fill_opacity.unwrap_or(0.3)
                    )),
                );
                options.insert("strokeColor".into(), json!(style.stroke_color.as_deref().unwrap_or("#ff0000")));
                options.insert("strokeWidth".into(), json!(style.stroke_width.unwrap_or(2.0)));
                "Polygon"
            }
        };
        (class, Value::Object(options))
    }

    fn build(&self, map: Rc<dyn NativeMap>, zone: &ZoneDescriptor, on_edit_end: EditEndCallback) -> Result<NativeHandle> {
        let (class, options) = self.zone_options(map.as_ref(), zone);
        let object = map.construct(class, vec![options])?;
        Ok(NativeHandle::zone(&zone.id, zone.kind(), map, object, UpdateGuard::default(), on_edit_end))
    }
}

impl ZoneAdapter for TwoGisZoneAdapter {
    fn mount(
        &self,
        context: &MapContext,
        zone: &ZoneDescriptor,
        on_edit_end: EditEndCallback,
    ) -> Result<NativeHandle> {
        tracing::debug!("[2gis] mounting {} zone {}", zone.kind(), zone.id);
        if zone.editable {
            tracing::debug!("[2gis] zone {} requested editing; no native editor available", zone.id);
        }
        self.build(context.native()?, zone, on_edit_end)
    }

    fn unmount(&self, handle: &NativeHandle) {
        tracing::debug!("[2gis] unmounting zone {}", handle.id());
        handle.dispose(destroy);
    }

    fn update(&self, handle: &NativeHandle, zone: &ZoneDescriptor) -> Result<UpdateOutcome> {
        ensure_live(handle)?;
        ensure_kind(handle, zone)?;
        let on_edit_end = handle
            .on_edit_end
            .clone()
            .ok_or_else(|| GeoError::native(format!("'{}' is not a zone handle", handle.id())))?;
        let replacement = self.build(Rc::clone(&handle.map), zone, on_edit_end)?;
        handle.dispose(destroy);
        Ok(UpdateOutcome::Replaced(replacement))
    }

    fn set_editable(&self, handle: &NativeHandle, editable: bool) -> Result<Capability> {
        ensure_live(handle)?;
        if editable {
            tracing::debug!("[2gis] editing not supported for zone {}", handle.id());
            return Ok(Capability::Gap);
        }
        Ok(Capability::Applied)
    }

    fn edit_mode(&self) -> EditMode {
        EditMode::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::headless::HeadlessMap;
    use crate::domain::model::{MarkerMeta, ProviderId, ZoneStyle};
    use std::cell::RefCell;

    fn setup() -> (Rc<HeadlessMap>, MapContext) {
        let map = HeadlessMap::shared(ProviderId::TwoGis);
        let ctx = MapContext::ready(map.clone());
        (map, ctx)
    }

    #[test]
    fn test_marker_uses_lng_lat_order() {
        let (map, ctx) = setup();
        let marker = MarkerDescriptor::new("m1", ProviderId::TwoGis, Point::new(55.75, 37.61));
        let handle = TwoGisMarkerAdapter.mount(&ctx, &marker, Rc::new(|_| {})).unwrap();
        assert_eq!(map.prop(handle.native_object(), "coordinates"), Some(json!([37.61, 55.75])));
        assert_eq!(map.live_count("Marker"), 1);
    }

    #[test]
    fn test_visual_update_replaces_marker_and_keeps_drag_callback() {
        let (map, ctx) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let marker = MarkerDescriptor::new("m1", ProviderId::TwoGis, Point::new(1.0, 2.0));
        let handle = TwoGisMarkerAdapter
            .mount(&ctx, &marker, Rc::new(move |p| sink.borrow_mut().push(p)))
            .unwrap();

        let relabeled = marker.clone().with_meta(MarkerMeta {
            label: Some("B".into()),
            ..Default::default()
        });
        let replacement = match TwoGisMarkerAdapter.update_visual(&handle, &relabeled).unwrap() {
            UpdateOutcome::Replaced(h) => h,
            UpdateOutcome::Mutated => panic!("2gis markers are rebuilt"),
        };
        assert!(handle.is_disposed());
        assert_eq!(map.live_count("Marker"), 1);
        assert_eq!(map.prop(replacement.native_object(), "label").unwrap()["text"], json!("B"));

        map.set_prop(replacement.native_object(), "coordinates", json!([3.0, 4.0]));
        map.emit(replacement.native_object(), "dragend", json!({}));
        assert_eq!(*seen.borrow(), vec![Point::new(4.0, 3.0)]);
    }

    #[test]
    fn test_circle_becomes_polygon_ring() {
        let (map, ctx) = setup();
        let adapter = TwoGisZoneAdapter::new(16);
        let zone = ZoneDescriptor::new("c1", ProviderId::TwoGis, ZoneShape::circle(Point::new(55.0, 37.0), 500.0));
        let handle = adapter.mount(&ctx, &zone, Rc::new(|_| {})).unwrap();

        let object = map.object(handle.native_object()).unwrap();
        assert_eq!(object.class, "Polygon");
        let ring = object.props["coordinates"][0].as_array().unwrap().len();
        assert_eq!(ring, 17);
        assert_eq!(object.props["color"], json!("rgba(255, 0, 0, 0.2)"));
    }

    #[test]
    fn test_fill_color_uses_style_opacity() {
        let (map, ctx) = setup();
        let zone = ZoneDescriptor::new(
            "p1",
            ProviderId::TwoGis,
            ZoneShape::polygon(vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0), Point::new(1.0, 0.0)]),
        )
        .with_style(ZoneStyle {
            fill_color: Some("#00ff00".into()),
            fill_opacity: Some(0.5),
            ..Default::default()
        });
        let handle = TwoGisZoneAdapter::default().mount(&ctx, &zone, Rc::new(|_| {})).unwrap();
        assert_eq!(map.prop(handle.native_object(), "color"), Some(json!("rgba(0, 255, 0, 0.5)")));
    }

    #[test]
    fn test_editing_is_a_capability_gap() {
        let (map, ctx) = setup();
        let adapter = TwoGisZoneAdapter::default();
        let zone = ZoneDescriptor::new(
            "l1",
            ProviderId::TwoGis,
            ZoneShape::polyline(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
        );
        let handle = adapter.mount(&ctx, &zone, Rc::new(|_| {})).unwrap();
        assert_eq!(adapter.set_editable(&handle, true).unwrap(), Capability::Gap);
        assert_eq!(adapter.edit_mode(), EditMode::Unsupported);
        assert_eq!(map.listener_count(handle.native_object()), 0);
        assert_eq!(map.live_count("Polyline"), 1);
    }

    #[test]
    fn test_zone_update_rejects_kind_change() {
        let (_map, ctx) = setup();
        let adapter = TwoGisZoneAdapter::default();
        let zone = ZoneDescriptor::new("z", ProviderId::TwoGis, ZoneShape::circle(Point::new(0.0, 0.0), 100.0));
        let handle = adapter.mount(&ctx, &zone, Rc::new(|_| {})).unwrap();
        let changed = ZoneDescriptor::new(
            "z",
            ProviderId::TwoGis,
            ZoneShape::polyline(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
        );
        assert!(matches!(
            adapter.update(&handle, &changed),
            Err(GeoError::InvalidDescriptor { .. })
        ));
        assert!(!handle.is_disposed());
    }

    #[test]
    fn test_failed_listener_destroys_marker() {
        let (map, ctx) = setup();
        map.fail_on("dragend");
        let marker = MarkerDescriptor::new("m1", ProviderId::TwoGis, Point::new(1.0, 1.0));
        assert!(TwoGisMarkerAdapter.mount(&ctx, &marker, Rc::new(|_| {})).is_err());
        assert_eq!(map.calls_to("destroy").len(), 1);
        assert!(map.live_objects().is_empty());
    }
}
