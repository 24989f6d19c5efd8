pub mod adapter;
pub mod engine;
pub mod link;
pub mod protocol;
pub mod uci;

pub use adapter::WorkerAdapter;
pub use engine::{EngineHandle, EngineLines, EngineRegistry, ProcessSpec, Slot};
pub use link::{serve_json_lines, WorkerLink};
pub use protocol::{Inbound, Outbound, SearchPayload};
