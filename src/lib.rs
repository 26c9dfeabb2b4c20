pub mod protocol;
pub mod resolver;
pub mod settings;
