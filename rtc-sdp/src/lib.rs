#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod description;
pub mod direction;
pub mod extmap;
pub mod util;

pub use description::{media::MediaDescription, session::SessionDescription};
