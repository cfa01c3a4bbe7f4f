pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod refresh;
pub mod signing;

#[cfg(test)]
pub mod testing;
