//! Pure transforms from a raw snapshot to what the dashboard draws.
//!
//! Every function here is a pure function of its inputs: no I/O, no retained
//! state, no suspension points. The engine crate calls them in a fixed order:
//! [`classify`] → [`view`] → [`group_by_layer`] → [`layout`].

pub mod classifier;
pub mod config;
pub mod layout;
pub mod pipeline;

pub use classifier::{band_for_rsi, classify, ClassifiedAsset, ClassifiedSnapshot, Defect};
pub use config::{LayoutConfig, LayoutConfigError, SizeStep};
pub use layout::{layout, PositionedItem, Rect};
pub use pipeline::{group_by_layer, view, ViewMode, ViewQuery};
