pub mod network;
pub mod schema;
pub mod stability;
pub mod subscription;
