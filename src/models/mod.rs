pub mod credential;
pub mod project;
