pub mod error;
pub mod gateway;
pub mod hooks;
pub mod id;
pub mod money;
pub mod store;
pub mod transaction;
pub mod validators;
