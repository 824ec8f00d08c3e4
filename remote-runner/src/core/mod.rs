//! Pure pipeline logic: environment resolution and stage transitions.

pub mod remote;
pub mod stage;
