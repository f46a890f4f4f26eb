pub mod apply;
pub mod autonomous;
pub mod config;
pub mod db;
pub mod errors;
pub mod evaluation;
pub mod models;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;
