//! Background Tasks Module
//!
//! # Tasks
//! - Cache sweep: removes expired detection results at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
