pub mod booking;
pub mod job;
pub mod job_event;
pub mod job_execution;
pub mod payment;
pub mod train;
pub mod wallet;
