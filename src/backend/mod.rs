pub mod cache;
pub mod config;
pub mod error;
pub mod gallery;
pub mod picsum;
pub mod transport;

#[cfg(test)]
pub mod testing;
