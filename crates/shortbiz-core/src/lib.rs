//! Core library for shortbiz.
//!
//! This crate provides the types and services behind the `shortbiz` CLI and
//! MCP server: accounts, link-in-bio pages, plans and subscriptions, the
//! contact form, and AI blog generation.
//!
//! # Modules
//!
//! - [`blog`] - Blog generation pipeline
//! - [`llm`] - Text-generation backend client
//! - [`store`] - SQLite persistence
//! - [`auth`] - Accounts and access tokens
//! - [`content`] - Link-in-bio pages and analytics
//! - [`pricing`] - Plan catalogue
//! - [`payments`] - Checkout and subscription lifecycle
//! - [`contact`] - Contact form
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```no_run
//! use shortbiz_core::{ConfigLoader, Store, blog};
//!
//! let (config, _sources) = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let store = Store::open(&config.resolve_database_path().unwrap()).unwrap();
//! let cost = blog::estimate_cost(800, &blog::FeatureSelection::default());
//! println!("800 words cost {cost} tokens");
//! # drop(store);
//! ```
#![deny(unsafe_code)]

pub mod auth;
pub mod blog;
pub mod config;
pub mod contact;
pub mod content;
pub mod error;
pub mod llm;
pub mod payments;
pub mod pricing;
pub mod store;

pub use auth::Auth;
pub use blog::{BlogGenerator, BlogRequest, GenerationOutcome, GenerationSettings};
pub use config::{Config, ConfigLoader, LogLevel};
pub use error::{ConfigError, ConfigResult, ServiceError, ServiceResult, StoreError, StoreResult};
pub use llm::{GenerationClient, ResponsesClient};
pub use store::Store;
