pub mod candidates;
pub mod command_runner;
pub mod config;
pub mod doctor;
pub mod estimator;
pub mod events;
pub mod executor;
pub mod flow;
pub mod input;
pub mod listener;
pub mod mount;
pub mod scheduler;
pub mod signal_bus;
#[cfg(test)]
pub(crate) mod test_support;
pub mod time;
