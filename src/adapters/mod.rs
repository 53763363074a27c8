pub mod api_errors;
pub mod gateway_client;
pub mod http;
pub mod webhook_auth;
