use overlay_sync::domain::model::ZoneStyle;
use overlay_sync::{HeadlessMap, MapSession, Point, ProviderId, ZoneDescriptor, ZoneShape};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

type Edits = Rc<RefCell<Vec<(String, ZoneShape)>>>;

fn ready_session(provider: ProviderId) -> (MapSession, Rc<HeadlessMap>, Edits) {
    let edits: Edits = Rc::default();
    let sink = Rc::clone(&edits);
    let mut session = MapSession::with_default_adapters(
        provider,
        32,
        Rc::new(|_, _| {}),
        Rc::new(move |id, shape| sink.borrow_mut().push((id.to_string(), shape))),
    );
    let map = HeadlessMap::shared(provider);
    session.map_ready(map.clone()).unwrap();
    (session, map, edits)
}

fn circle(id: &str, provider: ProviderId, radius: f64) -> ZoneDescriptor {
    ZoneDescriptor::new(id, provider, ZoneShape::circle(Point::new(55.75, 37.61), radius))
}

#[test]
fn test_editor_moves_to_last_editable_zone() {
    let (mut session, map, edits) = ready_session(ProviderId::Yandex);
    let z0 = circle("z0", ProviderId::Yandex, 500.0).editable(true);
    let z1 = circle("z1", ProviderId::Yandex, 800.0);

    let report = session.sync_zones(&[z0.clone(), z1.clone()]).unwrap();
    assert_eq!(report.mounted, vec!["z0", "z1"]);
    assert_eq!(session.active_edit().as_deref(), Some("z0"));
    assert_eq!(map.calls_to("editor.startEditing").len(), 1);

    let report = session.sync_zones(&[z0.clone(), z1.clone().editable(true)]).unwrap();
    assert_eq!(report.updated, vec!["z1"]);
    assert_eq!(session.active_edit().as_deref(), Some("z1"));

    let zones = session.zones().cache();
    let z0_handle = zones.handle("z0").unwrap();
    let z1_handle = zones.handle("z1").unwrap();
    assert!(!z0_handle.is_editing());
    assert!(z1_handle.is_editing());
    let stops = map.calls_to("editor.stopEditing");
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].target, z0_handle.native_object());

    // Late geometry events from the old editor are dropped.
    let z0_object = z0_handle.native_object();
    map.set_prop(z0_object, "geometry.coordinates", json!([55.0, 37.0]));
    map.set_prop(z0_object, "geometry.radius", json!(650.0));
    map.emit(z0_object, "editor.geometrychange", json!({}));
    assert!(edits.borrow().is_empty());

    let z1_object = z1_handle.native_object();
    map.set_prop(z1_object, "geometry.coordinates", json!([55.76, 37.62]));
    map.set_prop(z1_object, "geometry.radius", json!(900.0));
    map.emit(z1_object, "editor.geometrychange", json!({}));
    let edited = ZoneShape::circle(Point::new(55.76, 37.62), 900.0);
    assert_eq!(*edits.borrow(), vec![("z1".to_string(), edited.clone())]);

    // The application stores the edit and passes it back unchanged.
    map.clear_calls();
    let stored = ZoneDescriptor {
        shape: edited,
        ..z1.editable(true)
    };
    session.sync_zones(&[z0, stored]).unwrap();
    assert!(map.calls_to("geometry.setCoordinates").is_empty());
    assert!(map.calls_to("geometry.setRadius").is_empty());
    assert_eq!(edits.borrow().len(), 1);
}

#[test]
fn test_edit_zone_switches_and_stops_editor() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    session
        .sync_zones(&[circle("a", ProviderId::Yandex, 100.0), circle("b", ProviderId::Yandex, 200.0)])
        .unwrap();

    session.edit_zone(Some("a")).unwrap();
    session.edit_zone(Some("b")).unwrap();
    assert_eq!(session.active_edit().as_deref(), Some("b"));
    assert_eq!(map.calls_to("editor.startEditing").len(), 2);
    assert_eq!(map.calls_to("editor.stopEditing").len(), 1);

    session.edit_zone(None).unwrap();
    assert_eq!(session.active_edit(), None);
    assert_eq!(map.calls_to("editor.stopEditing").len(), 2);
    assert!(session.edit_zone(Some("missing")).is_err());
}

#[test]
fn test_removing_zone_mid_edit_stops_editor_first() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    session
        .sync_zones(&[circle("z1", ProviderId::Yandex, 300.0).editable(true)])
        .unwrap();
    let object = session.zones().cache().handle("z1").unwrap().native_object();
    map.clear_calls();

    let report = session.sync_zones(&[]).unwrap();
    assert_eq!(report.removed, vec!["z1"]);
    let methods: Vec<String> = map.calls().into_iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["editor.stopEditing", "geoObjects.remove"]);
    assert_eq!(map.listener_count(object), 0);
    assert_eq!(session.active_edit(), None);
}

#[test]
fn test_kind_change_remounts_zone() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    session.sync_zones(&[circle("z1", ProviderId::Yandex, 300.0)]).unwrap();

    let square = ZoneDescriptor::new(
        "z1",
        ProviderId::Yandex,
        ZoneShape::rectangle(Point::new(55.0, 37.0), Point::new(56.0, 38.0)),
    );
    let report = session.sync_zones(&[square]).unwrap();
    assert_eq!(report.replaced, vec!["z1"]);
    assert_eq!(map.live_count("Circle"), 0);
    assert_eq!(map.live_count("Polygon"), 1);
    assert_eq!(session.zones().cache().len(), 1);
}

#[test]
fn test_programmatic_resize_is_not_reported_as_edit() {
    let (mut session, map, edits) = ready_session(ProviderId::Google);
    map.echo_on("setCenter", "center_changed");
    map.echo_on("setRadius", "radius_changed");
    let zone = circle("c1", ProviderId::Google, 1000.0).editable(true);
    session.sync_zones(&[zone.clone()]).unwrap();

    let resized = ZoneDescriptor {
        shape: ZoneShape::circle(Point::new(55.75, 37.61), 1200.0),
        ..zone.clone()
    };
    session.sync_zones(&[resized.clone()]).unwrap();
    assert_eq!(map.calls_to("setRadius").len(), 1);
    assert!(edits.borrow().is_empty());
    map.tick();

    let object = session.zones().cache().handle("c1").unwrap().native_object();
    map.set_prop(object, "radius", json!(1500.0));
    map.emit(object, "radius_changed", json!({}));
    let edited = ZoneShape::circle(Point::new(55.75, 37.61), 1500.0);
    assert_eq!(*edits.borrow(), vec![("c1".to_string(), edited.clone())]);

    map.clear_calls();
    session
        .sync_zones(&[ZoneDescriptor {
            shape: edited,
            ..resized
        }])
        .unwrap();
    assert!(map.calls_to("setRadius").is_empty());
    assert_eq!(edits.borrow().len(), 1);
}

#[test]
fn test_google_zones_edit_independently() {
    let (mut session, map, _) = ready_session(ProviderId::Google);
    session
        .sync_zones(&[
            circle("a", ProviderId::Google, 100.0).editable(true),
            circle("b", ProviderId::Google, 200.0).editable(true),
        ])
        .unwrap();
    let cache = session.zones().cache();
    assert!(cache.handle("a").unwrap().is_editing());
    assert!(cache.handle("b").unwrap().is_editing());
    assert_eq!(session.active_edit(), None);
    assert!(map.calls_to("setEditable").is_empty());
}

#[test]
fn test_twogis_reports_editing_gap() {
    let (mut session, map, _) = ready_session(ProviderId::TwoGis);
    let zone = circle("z1", ProviderId::TwoGis, 400.0).editable(true);
    let report = session.sync_zones(&[zone.clone()]).unwrap();
    assert_eq!(report.mounted, vec!["z1"]);
    assert_eq!(report.capability_gaps, vec!["z1"]);
    assert_eq!(map.live_count("Polygon"), 1);

    let report = session.sync_zones(&[zone.clone().editable(false)]).unwrap();
    assert!(report.capability_gaps.is_empty());

    let restyled = zone.with_style(ZoneStyle {
        fill_color: Some("#00ff00".into()),
        ..Default::default()
    });
    let before = session.zones().cache().handle("z1").unwrap().native_object();
    let report = session.sync_zones(&[restyled]).unwrap();
    assert_eq!(report.replaced, vec!["z1"]);
    assert_eq!(report.capability_gaps, vec!["z1"]);
    assert_ne!(session.zones().cache().handle("z1").unwrap().native_object(), before);
    assert_eq!(map.live_count("Polygon"), 1);
}

#[test]
fn test_invalid_zone_is_reported_and_others_mount() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    let report = session
        .sync_zones(&[
            circle("flat", ProviderId::Yandex, 0.0),
            ZoneDescriptor::new("tri", ProviderId::Yandex, ZoneShape::polygon(vec![Point::new(0.0, 0.0)])),
            ZoneDescriptor::new(
                "line",
                ProviderId::Yandex,
                ZoneShape::polyline(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
            ),
        ])
        .unwrap();
    let failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["flat", "tri"]);
    assert_eq!(report.mounted, vec!["line"]);
    assert_eq!(map.live_count("Polyline"), 1);
}

#[test]
fn test_stale_edit_does_not_mask_later_resize() {
    let (mut session, map, edits) = ready_session(ProviderId::Google);
    let zone = circle("c1", ProviderId::Google, 1000.0).editable(true);
    session.sync_zones(&[zone.clone()]).unwrap();
    let object = session.zones().cache().handle("c1").unwrap().native_object();

    map.set_prop(object, "radius", json!(1500.0));
    map.emit(object, "radius_changed", json!({}));
    assert_eq!(edits.borrow().len(), 1);

    // The application picks a different radius, then settles on the edited one.
    session.sync_zones(&[circle("c1", ProviderId::Google, 2000.0).editable(true)]).unwrap();
    map.tick();
    assert_eq!(map.prop(object, "radius"), Some(json!(2000.0)));

    session.sync_zones(&[circle("c1", ProviderId::Google, 1500.0).editable(true)]).unwrap();
    assert_eq!(map.prop(object, "radius"), Some(json!(1500.0)));
}

#[test]
fn test_rejected_edit_is_rolled_back() {
    let (mut session, map, _) = ready_session(ProviderId::Google);
    let zone = circle("c1", ProviderId::Google, 1000.0).editable(true);
    session.sync_zones(&[zone.clone()]).unwrap();
    let object = session.zones().cache().handle("c1").unwrap().native_object();

    map.set_prop(object, "radius", json!(1500.0));
    map.emit(object, "radius_changed", json!({}));

    map.clear_calls();
    let report = session.sync_zones(&[zone.clone()]).unwrap();
    assert_eq!(report.updated, vec!["c1"]);
    assert_eq!(map.calls_to("setRadius").len(), 1);
    assert_eq!(map.prop(object, "radius"), Some(json!(1000.0)));

    map.tick();
    map.clear_calls();
    assert!(session.sync_zones(&[zone]).unwrap().is_noop());
    assert_eq!(map.call_count(), 0);
}

#[test]
fn test_editor_that_cannot_stop_keeps_map_and_cache_aligned() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    let a = circle("a", ProviderId::Yandex, 100.0).editable(true);
    session.sync_zones(&[a.clone()]).unwrap();
    map.fail_on("editor.stopEditing");

    let zones = [a, circle("b", ProviderId::Yandex, 200.0).editable(true)];
    for _ in 0..2 {
        let report = session.sync_zones(&zones).unwrap();
        let failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        assert_eq!(session.zones().cache().len(), 1);
        assert_eq!(map.live_count("Circle"), 1);
        assert_eq!(session.active_edit().as_deref(), Some("a"));
    }
}
