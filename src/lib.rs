//! # Chat Core Library
//!
//! Real-time chat between users:
//! - one-to-one and group rooms with unread counters
//! - a durable message ledger with per-recipient delivered/read state
//! - presence tracking across many connections per user
//! - event fan-out to WebSocket sessions and in-app notifications
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, repository traits and chat events
//! - **Application Layer**: Services, the event bus and DTOs
//! - **Infrastructure Layer**: PostgreSQL, Redis and in-memory stores, metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! chat_core/
//! +-- config/         Configuration management
//! +-- domain/         Entities, events and traits
//! +-- application/    Services, event bus, dispatcher and DTOs
//! +-- infrastructure/ Storage backends and metrics
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Common utilities (errors, snowflake IDs, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
