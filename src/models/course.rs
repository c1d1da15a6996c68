// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,

    /// Short course code (e.g. "CS 101").
    pub name: String,

    pub title: String,

    /// Term the course runs in (e.g. "Fall 2026").
    pub term_name: String,
}

/// Registration role within a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "instructor" => Some(Role::Instructor),
            _ => None,
        }
    }
}

/// Represents the 'course_registrations' table in the database.
/// One row per (course, user); role and section come from the registrar.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourseRegistration {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,

    /// 'student' or 'instructor'. Kept as text in the row; use `role()` for
    /// the typed view.
    pub role: String,

    pub section: i64,
}

impl CourseRegistration {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor.as_str()
    }
}

/// A course paired with the caller's registration in it.
/// Named record for the "courses for user" query result.
#[derive(Debug, Serialize)]
pub struct CourseAndRegistration {
    pub course: Course,
    pub registration: CourseRegistration,
}
