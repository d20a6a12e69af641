//! Module: index
//! Responsibility: the index-maintainer contract and every concrete index
//! kind's key layout (spec.md §4.3).
//! Does not own: the online index builder (spec.md §4.4, a separate
//! module that drives maintainers through `scan_item` during backfill) or
//! query execution (which reads maintainer-owned keys but is not a
//! maintainer itself).
//! Boundary: `contracts::IndexMaintainer` is the only interface the write
//! path and the online builder use; everything under `maintainers` is an
//! implementation detail behind it.

pub mod contracts;
pub mod maintainers;

pub use contracts::{IndexMaintainer, Item, field_values, values_equal};
