//! Conversion of a labelled third-party corpus into the `real/` / `fake/`
//! layout consumed by [`dataset::build`](crate::dataset::build).

pub mod metadata;
pub mod stage;

pub use metadata::{map_label, parse_line, parse_metadata, MetadataEntry, DEFAULT_ID_PREFIX};
pub use stage::{stage_subset, StageError, StageRequest, StageStats};
