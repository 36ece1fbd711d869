pub mod model;
pub mod persist;
