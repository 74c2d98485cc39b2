pub mod model;
pub mod steps;
