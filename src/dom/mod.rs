pub mod document;
pub mod dom_model;
pub mod elements;
pub mod selector;
pub mod traversal;
