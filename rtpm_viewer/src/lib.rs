//! Library surface of the rtpm viewer; the binary is a thin wrapper.

pub mod history;
pub mod table;
pub mod types;
pub mod ws;
