pub mod common;
pub mod id;
pub mod status;
pub mod sync;
