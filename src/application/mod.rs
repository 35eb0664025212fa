pub mod bootstrap;
pub mod commands;
pub mod task_store;
pub mod timer_engine;
