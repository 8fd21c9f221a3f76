pub mod args;
pub mod commands;
pub mod mappers;
pub mod models;
