pub mod cart;
pub mod message;
