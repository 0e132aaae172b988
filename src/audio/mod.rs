// Audio module - Clock, buffers, gain automation, mixing graph and CPAL output

pub mod automation;
pub mod buffer;
pub mod clock;
pub mod engine;
pub mod graph;
