//! Declarative form reconciliation

pub mod content_json;
pub mod identity;
pub mod model;
pub mod navigation;
pub mod plan;
pub mod reconciler;
pub mod translate;
pub mod validate;

pub use identity::{CreateIndex, IdentityMap};
pub use model::{FormModel, ItemKind, ItemModel};
pub use navigation::{NavigationError, NavigationResolver};
pub use plan::{PlanBuilder, ReconciliationPlan};
pub use reconciler::{FormReconciler, LifecycleResponse, RawBatchResponse, StateSink};
