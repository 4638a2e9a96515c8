pub mod catalog;
pub mod fanout;
pub mod listing;
pub mod registry;
pub mod resolver;
