//! Coordinates the single shared vertex editor of providers whose SDK only
//! supports one live edit session at a time.

use crate::core::cache::ReconciliationCache;
use crate::core::engine::ZoneEngine;
use crate::domain::model::{ProviderId, ZoneDescriptor};
use crate::domain::native::Capability;
use crate::domain::ports::{EditEndCallback, ZoneEditedCallback};
use crate::utils::error::{GeoError, Result};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct EditSession {
    active: Rc<RefCell<Option<String>>>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.borrow().clone()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.borrow().as_deref() == Some(id)
    }

    /// Stops the current editor, if any, then starts editing `id`.
    pub fn activate(
        &self,
        engine: &ZoneEngine,
        provider: ProviderId,
        zones: &ReconciliationCache<ZoneDescriptor>,
        id: &str,
    ) -> Result<Capability> {
        if self.is_active(id) {
            return Ok(Capability::Applied);
        }
        let handle = zones
            .handle(id)
            .ok_or_else(|| GeoError::native(format!("zone '{}' is not mounted", id)))?;
        self.deactivate(engine, provider, zones)?;

        let capability = engine.set_editable(provider, handle, true)?;
        if capability == Capability::Applied {
            tracing::debug!("Edit session moved to zone {}", id);
            *self.active.borrow_mut() = Some(id.to_string());
        }
        Ok(capability)
    }

    /// Records `id` as active when its editor was already started by mount.
    pub fn adopt(
        &self,
        engine: &ZoneEngine,
        provider: ProviderId,
        zones: &ReconciliationCache<ZoneDescriptor>,
        id: &str,
    ) -> Result<()> {
        if !self.is_active(id) {
            self.deactivate(engine, provider, zones)?;
            *self.active.borrow_mut() = Some(id.to_string());
        }
        Ok(())
    }

    /// Stops the active editor. A zone that is no longer mounted is simply
    /// forgotten; a zone whose editor refuses to stop stays active.
    pub fn deactivate(
        &self,
        engine: &ZoneEngine,
        provider: ProviderId,
        zones: &ReconciliationCache<ZoneDescriptor>,
    ) -> Result<()> {
        let Some(previous) = self.active_id() else {
            return Ok(());
        };
        if let Some(handle) = zones.handle(&previous) {
            engine.set_editable(provider, handle, false)?;
            tracing::debug!("Edit session on zone {} stopped", previous);
        }
        *self.active.borrow_mut() = None;
        Ok(())
    }

    /// Forgets `id` after its zone was unmounted.
    pub fn release(&self, id: &str) {
        if self.is_active(id) {
            *self.active.borrow_mut() = None;
        }
    }

    pub fn clear(&self) {
        *self.active.borrow_mut() = None;
    }

    /// Edit callback that forwards only while `id` holds the session.
    pub fn router(&self, id: &str, on_edit: ZoneEditedCallback) -> EditEndCallback {
        let active = Rc::clone(&self.active);
        let id = id.to_string();
        Rc::new(move |shape| {
            let is_active = active.borrow().as_deref() == Some(id.as_str());
            if is_active {
                on_edit(&id, shape);
            } else {
                tracing::debug!("Ignoring geometry change from inactive zone {}", id);
            }
        })
    }
}
