// src/models/mod.rs

pub mod attempt;
pub mod certificate;
pub mod level;
pub mod purchase;
pub mod question;
pub mod session;
pub mod user;
