// src/utils/mod.rs

pub mod color;
pub mod hash;
pub mod html;
pub mod image;
pub mod jwt;
pub mod pagination;
pub mod shopping;
