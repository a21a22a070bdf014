//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, crypto and repository calls into use-case APIs.
//! - Keep API/transport layers decoupled from storage and cipher details.

pub mod company_service;
pub mod member_service;
