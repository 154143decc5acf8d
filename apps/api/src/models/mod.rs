pub mod application;
pub mod job;
pub mod messaging;
pub mod notification;
pub mod resume;
pub mod user;
