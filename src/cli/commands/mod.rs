pub mod inspect;
pub mod sign;
pub mod watch;
