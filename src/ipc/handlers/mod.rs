pub mod admin_users;
pub mod attendance;
pub mod classes;
pub mod core;
pub mod departments;
pub mod roles;
pub mod seed;
pub mod student;
pub mod subjects;
pub mod timetable;
