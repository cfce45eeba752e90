/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, session and own-account endpoints
/// - `users`: User administration (admin)
/// - `members`: Member profiles
/// - `activities`: Recorded activities
/// - `goals`: Goals (metas)
/// - `files`: Document uploads
/// - `instituicoes`: Partner institutions
/// - `dashboard`: Goal progress roll-ups

pub mod activities;
pub mod auth;
pub mod dashboard;
pub mod files;
pub mod goals;
pub mod health;
pub mod instituicoes;
pub mod members;
pub mod users;
