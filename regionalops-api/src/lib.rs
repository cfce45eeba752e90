//! # RegionalOps API Server Library
//!
//! HTTP API for regional social-program operations: members, activities,
//! goals, institutions, document uploads and the goal dashboard. Persistence,
//! authentication and file storage are delegated to Supabase.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors with JSON rejections
//! - `middleware`: Security headers and rate limiting
//! - `response`: `{ "data": ... }` success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
