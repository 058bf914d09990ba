pub mod baseline;
pub mod config;
pub mod direction;
pub mod error;
pub mod flows;
pub mod io;
pub mod network;
pub mod periods;
pub mod pipeline;
pub mod stats;
pub mod store;
