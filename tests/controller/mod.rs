//! Controller tests
//!
//! Whole frames against the in-memory engine: lifecycle, selection side
//! effects, hand actions bound to buttons and inventory bookkeeping.

pub mod actions_test;
pub mod inventory_test;
pub mod plugin_test;
