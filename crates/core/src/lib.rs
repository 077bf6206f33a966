pub mod aggregate;
pub mod auto_reload;
pub mod busy;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod local_store;
pub mod records;
pub mod session;
pub mod tabs;
