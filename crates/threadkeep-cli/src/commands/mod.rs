pub mod check;
pub mod config;
pub mod history;
pub mod output;
pub mod threads;
