pub mod canonicalize;
pub mod list;
pub mod trace_id;
pub mod verify;
