//! Per-surface reconciliation machines and their shared timing utilities.

pub mod code;
pub mod cooldown;
pub mod debounce;
pub mod flowchart;
pub mod whiteboard;

pub use code::CodeSync;
pub use cooldown::Cooldown;
pub use debounce::Debounce;
pub use flowchart::{FlowchartParser, FlowchartSync};
pub use whiteboard::WhiteboardSync;
