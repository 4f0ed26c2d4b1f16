//! Behavioural suites for the lifecycle crate.

mod process_behaviour;
mod support;
