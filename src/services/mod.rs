// src/services/mod.rs

pub mod access;
pub mod notification;
pub mod quota;
