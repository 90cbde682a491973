// src/handlers/mod.rs

pub mod course;
pub mod payment;
pub mod progress;
pub mod quiz;
