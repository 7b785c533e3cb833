//! Back-office wizards: resumable multi-step forms for client onboarding,
//! quoting and payslip runs.
//!
//! The [`wizard`] module holds the step engine, [`drafts`] persists
//! in-progress runs, [`submit`] handles confirm-and-submit, and [`session`]
//! ties them together for one draft key. The concrete wizards live in
//! [`wizards`]; [`rest`] exposes them over HTTP.

pub mod api;
pub mod config;
pub mod drafts;
pub mod logging;
pub mod rest;
pub mod session;
pub mod submit;
pub mod wizard;
pub mod wizards;
