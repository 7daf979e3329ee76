pub mod catalog;
pub mod health;
pub mod info;
pub mod recommend;
