//! Session and data-normalization engine for the ZF (正方) academic portal.
//!
//! The portal has no API: the client logs in through its RSA-encrypted,
//! optionally captcha-gated login form, then drives the same form posts a
//! browser would and normalizes the loosely typed HTML/JSON it answers with.

pub mod config;
pub mod fmt;
pub mod logging;
pub mod portal;
pub mod utils;

pub use portal::{Envelope, PortalClient, PortalError, ResultCode};
