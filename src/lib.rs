pub mod api_connection;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod groceries;
pub mod intake;
pub mod planner;
pub mod recipe;
pub mod recipe_generator;
pub mod render;
pub mod storage;
pub mod validation;
