//! User-facing import flow: quota, orchestration, normalization and hand-off.

pub mod handlers;
pub mod quota;
pub mod service;
pub mod sink;
