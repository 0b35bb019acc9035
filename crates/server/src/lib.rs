pub mod errors;
pub mod routes;
pub mod startup;
pub mod users;

pub use startup::run;
