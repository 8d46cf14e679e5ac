//! Pure computation engine(s) for the basket price series.
//!
//! Nothing in here performs I/O or holds state between calls.

pub mod export;
pub mod forward_fill;
pub mod pricer;
pub mod range;
pub mod unify;

pub use export::ExportError;
pub use forward_fill::{build_grid, forward_fill, grid_slots, Horizon, StepCursor};
pub use pricer::{price_basket, BasketPricer};
pub use range::{filter_range, filter_range_in, RangeLabel, DEFAULT_RANGE, RANGE_PRESETS};
pub use unify::{default_resolution, unify, Unifier, UnifyError};
