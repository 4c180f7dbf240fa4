//! HTTP handlers

pub mod health;
pub mod attempts;
pub mod monitoring;
pub mod submissions;
pub mod weights;
