pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod repository;
pub mod service;
pub mod test_utils;
