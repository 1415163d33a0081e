pub mod content;
pub mod service;
pub mod traits;
pub mod types;
