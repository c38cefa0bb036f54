pub mod add;
pub mod delete;
pub mod events;
pub mod now;
pub mod patch;
pub mod reset;
pub mod respond;
pub mod watch;
