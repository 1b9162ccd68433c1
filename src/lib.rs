pub mod admin;
pub mod app;
pub mod attachments;
pub mod auth;
pub mod complaints;
pub mod config;
pub mod error;
pub mod notify;
pub mod state;

#[cfg(test)]
mod testing;
