//! REST API endpoint tests

mod chat_tests;
mod gateway_tests;
mod health_tests;
mod notification_tests;
