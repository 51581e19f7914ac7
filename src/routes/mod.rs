pub mod activity;
pub mod credits;
pub mod health;
pub mod reports;
pub mod settings;
