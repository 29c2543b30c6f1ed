pub mod audit;
pub mod deadline;
pub mod executor;
pub mod fare;
pub mod payment;
pub mod scheduler;
pub mod seating;
pub mod state_machine;
pub mod train_finder;
