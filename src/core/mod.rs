pub mod config;
pub mod error;
pub mod logging;
pub mod packager;
pub mod process;
#[cfg(test)]
pub(crate) mod testing;
pub mod workspace;
