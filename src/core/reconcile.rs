//! Diffs declarative marker and zone collections against the native objects
//! mounted on the active map, and applies the difference through the
//! engines.
//!
//! One pass removes stale entries first, then mounts or updates entities in
//! collection order. Per-entity failures are logged and reported without
//! aborting the pass; a missing adapter registration aborts it.

use crate::core::cache::ReconciliationCache;
use crate::core::context::MapContext;
use crate::core::edit_session::EditSession;
use crate::core::engine::{MarkerEngine, ZoneEngine};
use crate::domain::model::{MarkerDescriptor, Point, ProviderId, ZoneDescriptor, ZoneShape};
use crate::domain::native::{Capability, EditMode, UpdateOutcome};
use crate::domain::ports::{DragEndCallback, EditEndCallback, MarkerMovedCallback, ZoneEditedCallback};
use crate::utils::error::{GeoError, Result};
use crate::utils::validation::Validate;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityFailure {
    pub id: String,
    pub reason: String,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub mounted: Vec<String>,
    pub updated: Vec<String>,
    /// Entities whose native object had to be rebuilt.
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<EntityFailure>,
    pub capability_gaps: Vec<String>,
    pub skipped_foreign: Vec<String>,
    /// The map was not ready; the snapshot is kept for replay.
    pub deferred: bool,
}

impl ReconcileReport {
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Default::default()
        }
    }

    /// True when the pass touched no native object.
    pub fn is_noop(&self) -> bool {
        self.mounted.is_empty()
            && self.updated.is_empty()
            && self.replaced.is_empty()
            && self.removed.is_empty()
            && self.failed.is_empty()
            && !self.deferred
    }
}

/// Records a per-entity failure, or propagates errors that abort the pass.
fn record_failure(report: &mut ReconcileReport, id: &str, err: GeoError) -> Result<()> {
    if let GeoError::UnregisteredProvider { .. } = err {
        return Err(err);
    }
    tracing::warn!("Skipping '{}': {}", id, err);
    report.failed.push(EntityFailure {
        id: id.to_string(),
        reason: err.to_string(),
    });
    Ok(())
}

/// Keeps entities of the active provider, first occurrence of each id.
fn select<'a, T>(
    items: &'a [T],
    provider: ProviderId,
    id_of: impl Fn(&T) -> &str,
    provider_of: impl Fn(&T) -> ProviderId,
    report: &mut ReconcileReport,
) -> (Vec<&'a T>, HashSet<String>) {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    for item in items {
        let id = id_of(item);
        if provider_of(item) != provider {
            report.skipped_foreign.push(id.to_string());
            continue;
        }
        if !seen.insert(id.to_string()) {
            tracing::warn!("Duplicate id '{}' in collection; keeping the first", id);
            continue;
        }
        selected.push(item);
    }
    (selected, seen)
}

/// Positions and shapes last reported by user gestures, keyed by id.
type GestureLog<T> = Rc<RefCell<HashMap<String, T>>>;

/// Takes the pending gesture for `id`. Every pass that reaches an entity
/// consumes it, so a stale report never masks a later programmatic move.
fn take_gesture<T>(log: &GestureLog<T>, id: &str) -> Option<T> {
    log.borrow_mut().remove(id)
}

pub struct MarkerReconciler {
    engine: MarkerEngine,
    cache: ReconciliationCache<MarkerDescriptor>,
    on_moved: MarkerMovedCallback,
    dragged: GestureLog<Point>,
}

impl MarkerReconciler {
    pub fn new(engine: MarkerEngine, on_moved: MarkerMovedCallback) -> Self {
        Self {
            engine,
            cache: ReconciliationCache::new(),
            on_moved,
            dragged: Rc::default(),
        }
    }

    pub fn engine(&self) -> &MarkerEngine {
        &self.engine
    }

    pub fn cache(&self) -> &ReconciliationCache<MarkerDescriptor> {
        &self.cache
    }

    pub fn reconcile(&mut self, context: &MapContext, markers: &[MarkerDescriptor]) -> Result<ReconcileReport> {
        if !context.is_ready() {
            return Ok(ReconcileReport::deferred());
        }
        let provider = context.provider();
        self.engine.ensure_registered(provider)?;

        let mut report = ReconcileReport::default();
        let (desired, keep) = select(markers, provider, |m| m.id.as_str(), |m| m.provider, &mut report);

        for id in self.cache.ids() {
            if keep.contains(&id) {
                continue;
            }
            if let Some(entry) = self.cache.remove(&id) {
                self.engine.unmount(provider, &entry.handle)?;
                self.dragged.borrow_mut().remove(&id);
                report.removed.push(id);
            }
        }

        for marker in desired {
            if let Err(e) = self.apply(context, provider, marker, &mut report) {
                record_failure(&mut report, &marker.id, e)?;
            }
        }

        if !report.is_noop() {
            tracing::info!(
                "Markers reconciled on {}: {} mounted, {} updated, {} removed, {} failed",
                provider,
                report.mounted.len(),
                report.updated.len(),
                report.removed.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn apply(
        &mut self,
        context: &MapContext,
        provider: ProviderId,
        marker: &MarkerDescriptor,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let dragged = take_gesture(&self.dragged, &marker.id);
        let Some(entry) = self.cache.get_mut(&marker.id) else {
            marker.validate()?;
            let handle = self.engine.mount(provider, context, marker, self.drag_callback(&marker.id))?;
            self.cache.insert(marker.id.clone(), handle, marker.clone());
            report.mounted.push(marker.id.clone());
            return Ok(());
        };
        // After a drag the native object sits where the user dropped it.
        let native_position = dragged.unwrap_or(entry.descriptor.position);
        if entry.descriptor == *marker && native_position == marker.position {
            return Ok(());
        }
        marker.validate()?;

        if native_position != marker.position {
            self.engine.update_position(provider, &entry.handle, marker.position)?;
        }
        entry.descriptor.position = marker.position;
        if entry.descriptor.meta != marker.meta {
            match self.engine.update_visual(provider, &entry.handle, marker)? {
                UpdateOutcome::Mutated => {}
                UpdateOutcome::Replaced(handle) => {
                    entry.handle = handle;
                    report.replaced.push(marker.id.clone());
                }
            }
            entry.descriptor.meta = marker.meta.clone();
        }
        report.updated.push(marker.id.clone());
        Ok(())
    }

    fn drag_callback(&self, id: &str) -> DragEndCallback {
        let id = id.to_string();
        let dragged = Rc::clone(&self.dragged);
        let on_moved = Rc::clone(&self.on_moved);
        Rc::new(move |position| {
            tracing::debug!("Marker {} dragged to ({}, {})", id, position.lat, position.lng);
            dragged.borrow_mut().insert(id.clone(), position);
            on_moved(&id, position);
        })
    }

    /// Unmounts every cached marker; used when the map goes away.
    pub fn teardown(&mut self, provider: ProviderId) {
        for (id, entry) in self.cache.drain() {
            if let Err(e) = self.engine.unmount(provider, &entry.handle) {
                tracing::warn!("Failed to unmount marker {} during teardown: {}", id, e);
            }
        }
        self.dragged.borrow_mut().clear();
    }
}

pub struct ZoneReconciler {
    engine: ZoneEngine,
    cache: ReconciliationCache<ZoneDescriptor>,
    session: EditSession,
    on_edited: ZoneEditedCallback,
    edited: GestureLog<ZoneShape>,
}

impl ZoneReconciler {
    pub fn new(engine: ZoneEngine, on_edited: ZoneEditedCallback) -> Self {
        Self {
            engine,
            cache: ReconciliationCache::new(),
            session: EditSession::new(),
            on_edited,
            edited: Rc::default(),
        }
    }

    pub fn engine(&self) -> &ZoneEngine {
        &self.engine
    }

    pub fn cache(&self) -> &ReconciliationCache<ZoneDescriptor> {
        &self.cache
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn reconcile(&mut self, context: &MapContext, zones: &[ZoneDescriptor]) -> Result<ReconcileReport> {
        if !context.is_ready() {
            return Ok(ReconcileReport::deferred());
        }
        let provider = context.provider();
        self.engine.ensure_registered(provider)?;

        let mut report = ReconcileReport::default();
        let (desired, keep) = select(zones, provider, |z| z.id.as_str(), |z| z.provider, &mut report);

        for id in self.cache.ids() {
            if !keep.contains(&id) {
                self.remove(provider, &id)?;
                report.removed.push(id);
            }
        }

        for zone in desired {
            if let Err(e) = self.apply(context, provider, zone, &mut report) {
                record_failure(&mut report, &zone.id, e)?;
            }
        }

        if !report.is_noop() {
            tracing::info!(
                "Zones reconciled on {}: {} mounted, {} updated, {} removed, {} failed",
                provider,
                report.mounted.len(),
                report.updated.len(),
                report.removed.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn remove(&mut self, provider: ProviderId, id: &str) -> Result<()> {
        if let Some(entry) = self.cache.remove(id) {
            self.engine.unmount(provider, &entry.handle)?;
            self.session.release(id);
            self.edited.borrow_mut().remove(id);
        }
        Ok(())
    }

    fn apply(
        &mut self,
        context: &MapContext,
        provider: ProviderId,
        zone: &ZoneDescriptor,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let edited = take_gesture(&self.edited, &zone.id);
        let Some(cached) = self.cache.get(&zone.id) else {
            return self.mount(context, provider, zone, report);
        };
        // An edit the state owner did not adopt is rolled back below.
        let rejected = edited.as_ref().is_some_and(|shape| *shape != zone.shape);
        if cached.descriptor == *zone && !rejected {
            return Ok(());
        }
        zone.validate()?;

        if cached.descriptor.kind() != zone.kind() {
            tracing::debug!("Zone {} changed from {} to {}; remounting", zone.id, cached.descriptor.kind(), zone.kind());
            self.remove(provider, &zone.id)?;
            self.mount(context, provider, zone, report)?;
            report.replaced.push(zone.id.clone());
            return Ok(());
        }

        let body_changed = rejected
            || cached.descriptor.shape != zone.shape
            || cached.descriptor.style != zone.style
            || cached.descriptor.meta != zone.meta;
        let editable_changed = cached.descriptor.editable != zone.editable;
        let shape_only = cached.descriptor.style == zone.style && cached.descriptor.meta == zone.meta;

        if body_changed {
            let entry = self.cache.get_mut(&zone.id).ok_or_else(|| GeoError::native("zone vanished from cache"))?;
            let echoed = shape_only && edited.as_ref() == Some(&zone.shape);
            if !echoed {
                match self.engine.update(provider, &entry.handle, zone)? {
                    UpdateOutcome::Mutated => {}
                    UpdateOutcome::Replaced(handle) => {
                        entry.handle = handle;
                        report.replaced.push(zone.id.clone());
                    }
                }
            }
            entry.descriptor.shape = zone.shape.clone();
            entry.descriptor.style = zone.style.clone();
            entry.descriptor.meta = zone.meta.clone();
        }

        if editable_changed {
            if self.set_editable(provider, &zone.id, zone.editable)? == Capability::Gap {
                report.capability_gaps.push(zone.id.clone());
            }
            if let Some(entry) = self.cache.get_mut(&zone.id) {
                entry.descriptor.editable = zone.editable;
            }
        }
        report.updated.push(zone.id.clone());
        Ok(())
    }

    fn mount(
        &mut self,
        context: &MapContext,
        provider: ProviderId,
        zone: &ZoneDescriptor,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        zone.validate()?;
        let mode = self.engine.edit_mode(provider)?;
        let on_edit = self.edit_callback();
        let callback: EditEndCallback = match mode {
            EditMode::Centralized => self.session.router(&zone.id, on_edit),
            _ => {
                let id = zone.id.clone();
                Rc::new(move |shape| on_edit(&id, shape))
            }
        };
        let handle = self.engine.mount(provider, context, zone, callback)?;

        if zone.editable {
            match mode {
                EditMode::Centralized => {
                    if let Err(e) = self.session.adopt(&self.engine, provider, &self.cache, &zone.id) {
                        // Never leave an uncached object on the map.
                        self.engine.unmount(provider, &handle)?;
                        return Err(e);
                    }
                }
                EditMode::PerEntity => {}
                EditMode::Unsupported => report.capability_gaps.push(zone.id.clone()),
            }
        }
        self.cache.insert(zone.id.clone(), handle, zone.clone());
        report.mounted.push(zone.id.clone());
        Ok(())
    }

    fn edit_callback(&self) -> ZoneEditedCallback {
        let edited = Rc::clone(&self.edited);
        let on_edited = Rc::clone(&self.on_edited);
        Rc::new(move |id: &str, shape: ZoneShape| {
            tracing::debug!("Zone {} edited by user", id);
            edited.borrow_mut().insert(id.to_string(), shape.clone());
            on_edited(id, shape);
        })
    }

    fn set_editable(&self, provider: ProviderId, id: &str, editable: bool) -> Result<Capability> {
        match self.engine.edit_mode(provider)? {
            EditMode::Centralized if editable => self.session.activate(&self.engine, provider, &self.cache, id),
            EditMode::Centralized if self.session.is_active(id) => {
                self.session.deactivate(&self.engine, provider, &self.cache)?;
                Ok(Capability::Applied)
            }
            _ => {
                let handle = self
                    .cache
                    .handle(id)
                    .ok_or_else(|| GeoError::native(format!("zone '{}' is not mounted", id)))?;
                self.engine.set_editable(provider, handle, editable)
            }
        }
    }

    /// Moves the shared editor to `id`, or stops it with `None`.
    pub fn edit_zone(&mut self, provider: ProviderId, id: Option<&str>) -> Result<Capability> {
        match id {
            Some(id) => self.set_editable(provider, id, true),
            None => {
                if let Some(active) = self.session.active_id() {
                    self.set_editable(provider, &active, false)?;
                }
                Ok(Capability::Applied)
            }
        }
    }

    pub fn teardown(&mut self, provider: ProviderId) {
        for (id, entry) in self.cache.drain() {
            if let Err(e) = self.engine.unmount(provider, &entry.handle) {
                tracing::warn!("Failed to unmount zone {} during teardown: {}", id, e);
            }
        }
        self.session.clear();
        self.edited.borrow_mut().clear();
    }
}
