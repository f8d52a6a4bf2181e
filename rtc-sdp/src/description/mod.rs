#[cfg(test)]
mod description_test;

pub mod common;
pub mod media;
pub mod session;
