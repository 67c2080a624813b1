// src/handlers/mod.rs

pub mod executable;
pub mod health;
pub mod question;
pub mod questionnaire;
