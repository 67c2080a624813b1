// src/models/mod.rs

pub mod executable;
pub mod pagination;
pub mod question;
pub mod questionnaire;
