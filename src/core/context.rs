use crate::domain::model::ProviderId;
use crate::domain::ports::NativeMap;
use crate::utils::error::{GeoError, Result};
use std::fmt;
use std::rc::Rc;

/// Active provider plus, once the SDK has loaded, its live map bridge.
#[derive(Clone)]
pub struct MapContext {
    provider: ProviderId,
    map: Option<Rc<dyn NativeMap>>,
}

impl MapContext {
    pub fn new(provider: ProviderId) -> Self {
        Self { provider, map: None }
    }

    /// Context that is ready from the start.
    pub fn ready(map: Rc<dyn NativeMap>) -> Self {
        Self {
            provider: map.provider(),
            map: Some(map),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn is_ready(&self) -> bool {
        self.map.is_some()
    }

    pub fn native(&self) -> Result<Rc<dyn NativeMap>> {
        self.map.clone().ok_or(GeoError::AdapterUnavailable {
            provider: self.provider,
        })
    }

    /// Map-ready signal. Returns `false` if a map was already attached.
    pub fn attach(&mut self, map: Rc<dyn NativeMap>) -> Result<bool> {
        if map.provider() != self.provider {
            return Err(GeoError::ProviderMismatch {
                expected: self.provider,
                actual: map.provider(),
            });
        }
        if self.map.is_some() {
            tracing::warn!("Map for {} already attached; ignoring second ready signal", self.provider);
            return Ok(false);
        }
        tracing::info!("Map ready for provider {}", self.provider);
        self.map = Some(map);
        Ok(true)
    }
}

impl fmt::Debug for MapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapContext")
            .field("provider", &self.provider)
            .field("ready", &self.is_ready())
            .finish()
    }
}
