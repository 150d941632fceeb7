//! Wire types for the three upstream APIs

pub mod drive;
pub mod forms;
pub mod sheets;
