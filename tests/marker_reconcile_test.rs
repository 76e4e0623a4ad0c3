use overlay_sync::core::{MarkerReconciler, ZoneReconciler};
use overlay_sync::domain::model::MarkerMeta;
use overlay_sync::{
    GeoError, HeadlessMap, MapSession, MarkerDescriptor, MarkerEngine, NativeMap, Point, ProviderId, ZoneEngine,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

type Moves = Rc<RefCell<Vec<(String, Point)>>>;

fn ready_session(provider: ProviderId) -> (MapSession, Rc<HeadlessMap>, Moves) {
    let moves: Moves = Rc::default();
    let sink = Rc::clone(&moves);
    let mut session = MapSession::with_default_adapters(
        provider,
        64,
        Rc::new(move |id, p| sink.borrow_mut().push((id.to_string(), p))),
        Rc::new(|_, _| {}),
    );
    let map = HeadlessMap::shared(provider);
    session.map_ready(map.clone()).unwrap();
    (session, map, moves)
}

fn marker(id: &str, provider: ProviderId, lat: f64, lng: f64) -> MarkerDescriptor {
    MarkerDescriptor::new(id, provider, Point::new(lat, lng))
}

#[test]
fn test_mount_move_remove_scenario() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    let m1 = marker("m1", ProviderId::Yandex, 55.75, 37.61);

    let report = session.sync_markers(&[m1.clone()]).unwrap();
    assert_eq!(report.mounted, vec!["m1"]);
    assert!(session.markers().cache().contains("m1"));

    map.clear_calls();
    let moved = MarkerDescriptor {
        position: Point::new(56.0, 38.0),
        ..m1.clone()
    };
    let report = session.sync_markers(&[moved]).unwrap();
    assert_eq!(report.updated, vec!["m1"]);
    let set_calls = map.calls_to("geometry.setCoordinates");
    assert_eq!(set_calls.len(), 1);
    assert_eq!(set_calls[0].args, vec![json!([56.0, 38.0])]);
    assert!(map.calls_to("new Placemark").is_empty());

    let report = session.sync_markers(&[]).unwrap();
    assert_eq!(report.removed, vec!["m1"]);
    assert_eq!(map.calls_to("geoObjects.remove").len(), 1);
    assert!(session.markers().cache().is_empty());
    assert_eq!(map.live_count("Placemark"), 0);
}

#[test]
fn test_second_pass_without_changes_makes_no_native_calls() {
    for provider in ProviderId::ALL {
        let (mut session, map, _) = ready_session(provider);
        let markers = vec![
            marker("a", provider, 10.0, 20.0),
            marker("b", provider, -10.0, -20.0).with_meta(MarkerMeta {
                title: Some("B".into()),
                label: Some("b".into()),
                ..Default::default()
            }),
        ];
        session.sync_markers(&markers).unwrap();
        let calls = map.call_count();

        // Rebuilt but equal descriptors must compare by value.
        let rebuilt: Vec<MarkerDescriptor> = markers.iter().cloned().collect();
        let report = session.sync_markers(&rebuilt).unwrap();
        assert!(report.is_noop(), "{} pass was not a no-op: {:?}", provider, report);
        assert_eq!(map.call_count(), calls);
    }
}

#[test]
fn test_reused_id_leaves_one_native_object() {
    let (mut session, map, _) = ready_session(ProviderId::Google);
    session
        .sync_markers(&[marker("a", ProviderId::Google, 1.0, 1.0)])
        .unwrap();

    let replacement = marker("a", ProviderId::Google, 2.0, 2.0).with_meta(MarkerMeta {
        title: Some("New A".into()),
        ..Default::default()
    });
    session.sync_markers(&[replacement]).unwrap();

    let live = map.live_objects();
    assert_eq!(live.len(), 1);
    let (object, native) = &live[0];
    assert_eq!(native.props["position"], json!({"lat": 2.0, "lng": 2.0}));
    assert_eq!(native.props["title"], json!("New A"));
    assert_eq!(session.markers().cache().handle("a").unwrap().native_object(), *object);
}

#[test]
fn test_removals_run_before_mounts() {
    let (mut session, map, _) = ready_session(ProviderId::TwoGis);
    session
        .sync_markers(&[marker("old", ProviderId::TwoGis, 1.0, 1.0)])
        .unwrap();
    map.clear_calls();

    session
        .sync_markers(&[marker("new", ProviderId::TwoGis, 2.0, 2.0)])
        .unwrap();
    let methods: Vec<String> = map.calls().into_iter().map(|c| c.method).collect();
    let destroy = methods.iter().position(|m| m == "destroy").unwrap();
    let create = methods.iter().position(|m| m == "new Marker").unwrap();
    assert!(destroy < create);
}

#[test]
fn test_programmatic_move_is_not_reported_but_drag_is() {
    let (mut session, map, moves) = ready_session(ProviderId::Yandex);
    map.echo_on("geometry.setCoordinates", "dragend");
    let m1 = marker("m1", ProviderId::Yandex, 55.75, 37.61);
    session.sync_markers(&[m1.clone()]).unwrap();

    let moved = MarkerDescriptor {
        position: Point::new(55.8, 37.7),
        ..m1.clone()
    };
    session.sync_markers(&[moved.clone()]).unwrap();
    assert!(moves.borrow().is_empty());
    map.tick();

    let object = session.markers().cache().handle("m1").unwrap().native_object();
    map.set_prop(object, "geometry.coordinates", json!([55.9, 37.9]));
    map.emit(object, "dragend", json!({}));
    assert_eq!(*moves.borrow(), vec![("m1".to_string(), Point::new(55.9, 37.9))]);

    // Feeding the dragged position back does not push it to the map again.
    map.clear_calls();
    let dragged = MarkerDescriptor {
        position: Point::new(55.9, 37.9),
        ..moved
    };
    let report = session.sync_markers(&[dragged]).unwrap();
    assert_eq!(report.updated, vec!["m1"]);
    assert!(map.calls_to("geometry.setCoordinates").is_empty());
    assert_eq!(moves.borrow().len(), 1);
}

#[test]
fn test_bad_entity_does_not_abort_pass() {
    let (mut session, map, _) = ready_session(ProviderId::Google);
    let report = session
        .sync_markers(&[
            marker("bad", ProviderId::Google, 123.0, 0.0),
            marker("good", ProviderId::Google, 12.0, 0.0),
        ])
        .unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "bad");
    assert_eq!(report.mounted, vec!["good"]);
    assert_eq!(map.live_count("Marker"), 1);
    assert!(!session.markers().cache().contains("bad"));
}

#[test]
fn test_duplicates_and_foreign_markers() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    let report = session
        .sync_markers(&[
            marker("m1", ProviderId::Yandex, 1.0, 1.0),
            marker("g1", ProviderId::Google, 2.0, 2.0),
            marker("m1", ProviderId::Yandex, 3.0, 3.0),
        ])
        .unwrap();
    assert_eq!(report.mounted, vec!["m1"]);
    assert_eq!(report.skipped_foreign, vec!["g1"]);
    assert_eq!(map.live_count("Placemark"), 1);
    assert_eq!(
        session.markers().cache().get("m1").unwrap().descriptor.position,
        Point::new(1.0, 1.0)
    );

    // Moving a mounted marker to another provider unmounts it here.
    let report = session
        .sync_markers(&[marker("m1", ProviderId::TwoGis, 1.0, 1.0)])
        .unwrap();
    assert_eq!(report.removed, vec!["m1"]);
    assert_eq!(map.live_count("Placemark"), 0);
}

#[test]
fn test_twogis_visual_change_swaps_cached_handle() {
    let (mut session, map, _) = ready_session(ProviderId::TwoGis);
    let m1 = marker("m1", ProviderId::TwoGis, 55.0, 37.0);
    session.sync_markers(&[m1.clone()]).unwrap();
    let before = session.markers().cache().handle("m1").unwrap().native_object();

    let labeled = m1.with_meta(MarkerMeta {
        label: Some("Depot".into()),
        ..Default::default()
    });
    let report = session.sync_markers(&[labeled.clone()]).unwrap();
    assert_eq!(report.replaced, vec!["m1"]);
    let after = session.markers().cache().handle("m1").unwrap().native_object();
    assert_ne!(before, after);
    assert_eq!(map.live_count("Marker"), 1);

    let moved = MarkerDescriptor {
        position: Point::new(56.0, 38.0),
        ..labeled
    };
    session.sync_markers(&[moved]).unwrap();
    let set_calls = map.calls_to("setCoordinates");
    assert_eq!(set_calls.len(), 1);
    assert_eq!(set_calls[0].target, after);
    assert_eq!(set_calls[0].args, vec![json!([38.0, 56.0])]);
}

#[test]
fn test_missing_adapter_aborts_pass() {
    let mut session = MapSession::new(
        ProviderId::Google,
        MarkerReconciler::new(MarkerEngine::new(), Rc::new(|_, _| {})),
        ZoneReconciler::new(ZoneEngine::with_default_adapters(64), Rc::new(|_, _| {})),
    );
    session.map_ready(HeadlessMap::shared(ProviderId::Google)).unwrap();
    let err = session
        .sync_markers(&[marker("m1", ProviderId::Google, 0.0, 0.0)])
        .unwrap_err();
    assert!(matches!(err, GeoError::UnregisteredProvider { .. }));
}

#[test]
fn test_map_click_subscription() {
    let (session, map, _) = ready_session(ProviderId::TwoGis);
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&clicks);
    let subscription = session
        .subscribe_map_click(Rc::new(move |p| sink.borrow_mut().push(p)))
        .unwrap();

    map.emit(map.map_object(), "click", json!({"lngLat": [37.61, 55.75]}));
    assert_eq!(*clicks.borrow(), vec![Point::new(55.75, 37.61)]);

    subscription.unsubscribe();
    subscription.unsubscribe();
    assert!(!subscription.is_active());
    assert_eq!(map.emit(map.map_object(), "click", json!({"lngLat": [0.0, 0.0]})), 0);
    assert_eq!(clicks.borrow().len(), 1);
}

fn google_drag(map: &HeadlessMap, object: overlay_sync::domain::native::NativeObject, lat: f64, lng: f64) {
    map.set_prop(object, "position", json!({"lat": lat, "lng": lng}));
    map.emit(object, "dragend", json!({"latLng": {"lat": lat, "lng": lng}}));
}

#[test]
fn test_stale_drag_does_not_mask_later_move_back() {
    let (mut session, map, moves) = ready_session(ProviderId::Google);
    session
        .sync_markers(&[marker("m1", ProviderId::Google, 1.0, 1.0)])
        .unwrap();
    let object = session.markers().cache().handle("m1").unwrap().native_object();
    google_drag(&map, object, 5.0, 5.0);
    assert_eq!(moves.borrow().len(), 1);

    // The application moves the marker somewhere else instead.
    session
        .sync_markers(&[marker("m1", ProviderId::Google, 9.0, 9.0)])
        .unwrap();
    map.tick();
    assert_eq!(map.prop(object, "position"), Some(json!({"lat": 9.0, "lng": 9.0})));

    // Returning to the once-dragged point is a real move now.
    session
        .sync_markers(&[marker("m1", ProviderId::Google, 5.0, 5.0)])
        .unwrap();
    assert_eq!(map.prop(object, "position"), Some(json!({"lat": 5.0, "lng": 5.0})));
    assert_eq!(
        session.markers().cache().get("m1").unwrap().descriptor.position,
        Point::new(5.0, 5.0)
    );
}

#[test]
fn test_rejected_drag_puts_marker_back() {
    let (mut session, map, _) = ready_session(ProviderId::Google);
    let m1 = marker("m1", ProviderId::Google, 1.0, 1.0);
    session.sync_markers(&[m1.clone()]).unwrap();
    let object = session.markers().cache().handle("m1").unwrap().native_object();
    google_drag(&map, object, 5.0, 5.0);

    map.clear_calls();
    let report = session.sync_markers(&[m1.clone()]).unwrap();
    assert_eq!(report.updated, vec!["m1"]);
    assert_eq!(map.calls_to("setPosition").len(), 1);
    assert_eq!(map.prop(object, "position"), Some(json!({"lat": 1.0, "lng": 1.0})));

    // Once settled, the same collection is a no-op again.
    map.tick();
    map.clear_calls();
    assert!(session.sync_markers(&[m1]).unwrap().is_noop());
    assert_eq!(map.call_count(), 0);
}

#[test]
fn test_rejected_drag_is_undone_alongside_visual_change() {
    let (mut session, map, _) = ready_session(ProviderId::Yandex);
    let m1 = marker("m1", ProviderId::Yandex, 55.0, 37.0);
    session.sync_markers(&[m1.clone()]).unwrap();
    let object = session.markers().cache().handle("m1").unwrap().native_object();
    map.set_prop(object, "geometry.coordinates", json!([56.0, 38.0]));
    map.emit(object, "dragend", json!({}));

    let retitled = m1.with_meta(MarkerMeta {
        title: Some("Depot".into()),
        ..Default::default()
    });
    session.sync_markers(&[retitled]).unwrap();
    assert_eq!(map.prop(object, "geometry.coordinates"), Some(json!([55.0, 37.0])));
    assert_eq!(map.prop(object, "properties.hintContent"), Some(json!("Depot")));
}
