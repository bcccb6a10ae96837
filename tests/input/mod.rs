//! Input pipeline tests
//!
//! Packets are fed through [`backpack_vr::VrInput`] the way the runtime
//! callback would, checking what reaches callbacks and what reaches the game.

pub mod pipeline_test;
