pub mod credential;
pub mod profile;
pub mod user;
