//! Command implementations

pub mod health;
pub mod loyalty;
pub mod membership;
pub mod serve;
pub mod tenant;
