pub mod cart;
pub mod config;
pub mod doctor;
pub mod negotiate;
