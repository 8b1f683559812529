//! Payment confirmation and reconciliation service for the Lume storefront.
//!
//! The server side brokers checkout intents with the Yoco gateway, verifies
//! inbound webhooks and keeps an authoritative payment status per order
//! reference. The client side ([`verifier`]) runs after the payment redirect:
//! it polls the status endpoint with bounded retries and reconciles the
//! locally cached order record against the server-confirmed status.

pub mod app;
pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod idempotency;
pub mod orders;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod verifier;
pub mod verify;
pub mod webhook;
