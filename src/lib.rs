//! Upload a video, let Gemini watch it, get back a summary and a short quiz.

pub mod config;
pub mod error;
pub mod gemini;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;
pub mod upload;
