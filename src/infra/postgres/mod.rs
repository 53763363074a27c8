pub mod transaction_repo;
