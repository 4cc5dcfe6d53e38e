//! Deployer Library
//!
//! A self-deployment webhook: on an authenticated request it updates a
//! package from source control, runs its tests in a separate directory,
//! installs dependencies and runs a deployment command, reporting to the
//! process log, a live HTML page or an email.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod report;
pub mod server;
pub mod storage;
pub mod utils;
