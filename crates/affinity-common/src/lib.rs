//! Shared types for Affinity
//!
//! Everything that crosses the wire between `affinity-server` and
//! `affinity-client` lives here, together with the identifier rules both
//! sides enforce and the data-root lookup used by the server binary.

pub mod ids;
pub mod page;
pub mod paths;
pub mod relation;
pub mod wire;

pub use ids::{validate_id, IdError, MAX_ID_LEN};
pub use page::{ListParams, Page, Pagination};
pub use paths::{affinity_root, local_dir};
pub use relation::{ParseRelationTypeError, RelationType, TargetKind};
pub use wire::{ErrorBody, ErrorDetail, RelationView, RelationshipItem, ToggleState};
