use crate::adapters::apply_view;
use crate::adapters::convert::DEFAULT_CIRCLE_SEGMENTS;
use crate::core::context::MapContext;
use crate::core::engine::{MarkerEngine, ZoneEngine};
use crate::core::reconcile::{MarkerReconciler, ReconcileReport, ZoneReconciler};
use crate::domain::model::{MapView, MarkerDescriptor, ProviderId, ZoneDescriptor};
use crate::domain::native::{Capability, Subscription};
use crate::domain::ports::{MapClickCallback, MarkerMovedCallback, NativeMap, ZoneEditedCallback};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use serde::Serialize;
use std::rc::Rc;

/// Reports from replaying the snapshots received before the map was ready.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub markers: Option<ReconcileReport>,
    pub zones: Option<ReconcileReport>,
}

/// One active map: its context, both reconcilers and the edit session.
pub struct MapSession {
    context: MapContext,
    markers: MarkerReconciler,
    zones: ZoneReconciler,
    pending_markers: Option<Vec<MarkerDescriptor>>,
    pending_zones: Option<Vec<ZoneDescriptor>>,
    view: MapView,
}

impl MapSession {
    pub fn new(provider: ProviderId, markers: MarkerReconciler, zones: ZoneReconciler) -> Self {
        Self {
            context: MapContext::new(provider),
            markers,
            zones,
            pending_markers: None,
            pending_zones: None,
            view: MapView::default(),
        }
    }

    /// Session with the built-in adapters for every provider.
    pub fn with_default_adapters(
        provider: ProviderId,
        circle_segments: usize,
        on_marker_moved: MarkerMovedCallback,
        on_zone_edited: ZoneEditedCallback,
    ) -> Self {
        Self::new(
            provider,
            MarkerReconciler::new(MarkerEngine::with_default_adapters(), on_marker_moved),
            ZoneReconciler::new(ZoneEngine::with_default_adapters(circle_segments), on_zone_edited),
        )
    }

    /// Session whose callbacks ignore user gestures.
    pub fn headless(provider: ProviderId) -> Self {
        Self::with_default_adapters(provider, DEFAULT_CIRCLE_SEGMENTS, Rc::new(|_, _| {}), Rc::new(|_, _| {}))
    }

    pub fn provider(&self) -> ProviderId {
        self.context.provider()
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_ready()
    }

    pub fn context(&self) -> &MapContext {
        &self.context
    }

    pub fn markers(&self) -> &MarkerReconciler {
        &self.markers
    }

    pub fn zones(&self) -> &ZoneReconciler {
        &self.zones
    }

    pub fn active_edit(&self) -> Option<String> {
        self.zones.session().active_id()
    }

    /// The camera requested so far, merged across `set_view` calls.
    pub fn view(&self) -> MapView {
        self.view
    }

    /// Merges `view` into the requested camera. Applied now when the map is
    /// ready, otherwise on the next map-ready signal.
    pub fn set_view(&mut self, view: MapView) -> Result<()> {
        view.validate()?;
        self.view = self.view.merge(view);
        if !self.context.is_ready() {
            tracing::debug!("Map for {} not ready; deferring view {:?}", self.provider(), view);
            return Ok(());
        }
        apply_view(self.context.native()?.as_ref(), &view)
    }

    /// Map-ready signal. Applies the requested view, then replays the latest
    /// deferred snapshots once.
    pub fn map_ready(&mut self, map: Rc<dyn NativeMap>) -> Result<ReplayReport> {
        if !self.context.attach(Rc::clone(&map))? {
            return Ok(ReplayReport::default());
        }
        if !self.view.is_empty() {
            apply_view(map.as_ref(), &self.view)?;
        }
        let mut replay = ReplayReport::default();
        if let Some(markers) = self.pending_markers.take() {
            tracing::debug!("Replaying {} deferred marker(s)", markers.len());
            replay.markers = Some(self.markers.reconcile(&self.context, &markers)?);
        }
        if let Some(zones) = self.pending_zones.take() {
            tracing::debug!("Replaying {} deferred zone(s)", zones.len());
            replay.zones = Some(self.zones.reconcile(&self.context, &zones)?);
        }
        Ok(replay)
    }

    pub fn sync_markers(&mut self, markers: &[MarkerDescriptor]) -> Result<ReconcileReport> {
        if !self.context.is_ready() {
            tracing::debug!("Map for {} not ready; deferring {} marker(s)", self.provider(), markers.len());
            self.pending_markers = Some(markers.to_vec());
            return Ok(ReconcileReport::deferred());
        }
        self.markers.reconcile(&self.context, markers)
    }

    pub fn sync_zones(&mut self, zones: &[ZoneDescriptor]) -> Result<ReconcileReport> {
        if !self.context.is_ready() {
            tracing::debug!("Map for {} not ready; deferring {} zone(s)", self.provider(), zones.len());
            self.pending_zones = Some(zones.to_vec());
            return Ok(ReconcileReport::deferred());
        }
        self.zones.reconcile(&self.context, zones)
    }

    /// Moves the shared zone editor to `id`, or stops it.
    pub fn edit_zone(&mut self, id: Option<&str>) -> Result<Capability> {
        self.context.native()?;
        self.zones.edit_zone(self.context.provider(), id)
    }

    pub fn subscribe_map_click(&self, callback: MapClickCallback) -> Result<Subscription> {
        self.markers
            .engine()
            .subscribe_map_click(self.context.provider(), &self.context, callback)
    }

    /// Tears down every native object and starts a fresh, not-ready context
    /// for `provider`. Handles never migrate across providers; the requested
    /// view does and is applied to the next map.
    pub fn switch_provider(&mut self, provider: ProviderId) {
        let previous = self.context.provider();
        tracing::info!("Switching map provider {} -> {}", previous, provider);
        self.markers.teardown(previous);
        self.zones.teardown(previous);
        self.pending_markers = None;
        self.pending_zones = None;
        self.context = MapContext::new(provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::headless::HeadlessMap;
    use crate::domain::model::Point;
    use crate::utils::error::GeoError;

    #[test]
    fn test_sync_before_ready_is_deferred_then_replayed() {
        let mut session = MapSession::headless(ProviderId::Google);
        let markers = vec![MarkerDescriptor::new("m1", ProviderId::Google, Point::new(1.0, 2.0))];
        let report = session.sync_markers(&markers).unwrap();
        assert!(report.deferred);

        let map = HeadlessMap::shared(ProviderId::Google);
        let replay = session.map_ready(map.clone()).unwrap();
        assert_eq!(replay.markers.unwrap().mounted, vec!["m1".to_string()]);
        assert!(replay.zones.is_none());
        assert_eq!(map.live_count("Marker"), 1);

        let replay = session.map_ready(map.clone()).unwrap();
        assert_eq!(replay, ReplayReport::default());
        assert_eq!(map.live_count("Marker"), 1);
    }

    #[test]
    fn test_map_of_other_provider_is_rejected() {
        let mut session = MapSession::headless(ProviderId::Yandex);
        let err = session.map_ready(HeadlessMap::shared(ProviderId::TwoGis)).unwrap_err();
        assert!(matches!(err, GeoError::ProviderMismatch { .. }));
        assert!(!session.is_ready());
    }

    #[test]
    fn test_view_is_merged_and_applied_on_ready() {
        let mut session = MapSession::headless(ProviderId::Yandex);
        session.set_view(MapView::new(Some(Point::new(55.75, 37.61)), None)).unwrap();
        session.set_view(MapView::new(None, Some(12))).unwrap();
        assert!(session.set_view(MapView::new(None, Some(40))).is_err());
        assert_eq!(session.view(), MapView::new(Some(Point::new(55.75, 37.61)), Some(12)));

        let map = HeadlessMap::shared(ProviderId::Yandex);
        session.map_ready(map.clone()).unwrap();
        assert_eq!(map.prop(map.map_object(), "center"), Some(serde_json::json!([55.75, 37.61])));
        assert_eq!(map.prop(map.map_object(), "zoom"), Some(serde_json::json!(12)));

        map.clear_calls();
        session.set_view(MapView::new(None, Some(14))).unwrap();
        let methods: Vec<String> = map.calls().into_iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["setZoom"]);
    }

    #[test]
    fn test_click_subscription_requires_ready_map() {
        let session = MapSession::headless(ProviderId::TwoGis);
        assert!(matches!(
            session.subscribe_map_click(Rc::new(|_| {})),
            Err(GeoError::AdapterUnavailable { .. })
        ));
    }
}
