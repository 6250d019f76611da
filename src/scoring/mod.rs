pub mod candidate;
pub mod rules;
pub mod scorer;
pub mod visual;
