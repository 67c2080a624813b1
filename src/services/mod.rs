// src/services/mod.rs

pub mod eligibility;
pub mod scoring;
