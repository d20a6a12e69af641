//! Module: builder
//! Responsibility: the online index builder (spec.md §4.4) — progress
//! tracking (`range_set`), adaptive throttling (`throttler`), and the
//! pipeline itself (`online`).
//! Does not own: the per-kind maintainer logic each pipeline drives
//! through `scan_item` (`index::maintainers::*`).
//! Boundary: `online::OnlineBuilder` and `index_from_index::
//! IndexFromIndexBuilder` are the module's two public entry points;
//! `range_set`/`throttler` are implementation detail shared by both.

mod index_from_index;
mod online;
mod range_set;
mod throttler;

pub use index_from_index::{
    Compatibility, IndexFromIndexBuilder, analyze_compatibility, extract_primary_key,
};
pub use online::{BuildReport, IndexState, OnlineBuilder};
pub use range_set::RangeSet;
pub use throttler::Throttler;
