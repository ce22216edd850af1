pub mod config;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod launcher;
pub mod session;
pub mod shutdown;
pub mod upstream;
