pub mod config;
pub mod file;
pub mod prices;
pub mod rates;
pub mod stdin;
