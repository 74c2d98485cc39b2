pub mod client;
pub mod model;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{RestTestManagementClient, TestManagementApi};
