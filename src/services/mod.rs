pub mod reconciler;
pub mod request_builder;
pub mod sweeper;
pub mod transaction_service;
