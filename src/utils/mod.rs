// src/utils/mod.rs

pub mod glob;
pub mod hash;
pub mod jwt;
