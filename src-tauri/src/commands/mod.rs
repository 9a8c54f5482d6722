pub mod auth;
pub mod config;
pub mod dashboard;
pub mod health;
pub mod recipes;
pub mod reports;
pub mod users;
