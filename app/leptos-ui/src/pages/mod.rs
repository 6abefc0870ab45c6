pub mod catalog;
pub mod login;
