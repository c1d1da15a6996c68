// src/store/mod.rs
//
// Persistence components. Each is a struct constructed with an explicit pool
// handle, so a test can hand any component an in-memory database.

pub mod access;
pub mod changelog;
pub mod courses;
pub mod problems;
pub mod quizzes;
pub mod receipts;
pub mod standings;
