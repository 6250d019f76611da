pub mod detector;
pub mod field;
pub mod grouping;
pub mod identity;
pub mod resolver;
pub mod unified;
