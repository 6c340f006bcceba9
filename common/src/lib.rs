pub mod config;
pub mod detector;
pub mod error;
pub mod frame;
pub mod grid;
pub mod indicator;
pub mod proto;
pub mod reconcile;
pub mod rules;
pub mod scheduler;
pub mod session;
