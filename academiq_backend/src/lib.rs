pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod comments;
pub mod config;
pub mod database;
pub mod error;
pub mod moderation;
pub mod node;
pub mod posts;
pub mod search;
pub mod telemetry;
pub mod uploads;
pub mod users;
pub mod utils;
pub mod voting;
