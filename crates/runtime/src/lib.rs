pub mod debounce;
pub mod event_bus;
pub mod request_queue;

pub use debounce::*;
pub use event_bus::*;
pub use request_queue::*;
