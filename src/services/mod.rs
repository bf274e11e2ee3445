// src/services/mod.rs

pub mod article;
pub mod auth;
pub mod proxy;
