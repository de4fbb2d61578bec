pub mod analytics;
pub mod assessments;
pub mod classes;
pub mod core;
pub mod grades;
pub mod setup;
pub mod students;
pub mod subjects;
