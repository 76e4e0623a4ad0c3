pub mod cache;
pub mod context;
pub mod edit_session;
pub mod engine;
pub mod reconcile;
pub mod session;

pub use crate::utils::error::Result;
pub use cache::ReconciliationCache;
pub use context::MapContext;
pub use edit_session::EditSession;
pub use engine::{MarkerEngine, ZoneEngine};
pub use reconcile::{EntityFailure, MarkerReconciler, ReconcileReport, ZoneReconciler};
pub use session::{MapSession, ReplayReport};
