//! Session orchestration: the controller, the fragment aggregator and the
//! listeners messages are delivered to.

pub mod aggregator;
pub mod listener;
pub mod session;
