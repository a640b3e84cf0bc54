pub mod application;
pub mod cv;
pub mod job_offer;
pub mod log_entry;
pub mod notification;
pub mod user;
