pub mod completions;
pub mod health;
