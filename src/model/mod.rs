pub mod account;
pub mod presence;
pub mod role;
