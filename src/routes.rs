pub mod index;
pub mod login;
pub mod sse;
pub mod students;
