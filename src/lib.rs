#![allow(dead_code)]

pub mod util;
pub mod config;

pub mod model;
pub mod logic;
