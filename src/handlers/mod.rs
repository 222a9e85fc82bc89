// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod ingredients;
pub mod interaction;
pub mod recipes;
pub mod tags;
pub mod users;
