//! VietType configuration front-end core
//!
//! Settings persistence, the packed toggle hotkey, profile activation through
//! the engine library, and the cross-process "settings changed" counter.

#![cfg_attr(not(windows), forbid(unsafe_code))]

pub mod activation;
pub mod config;
pub mod constants;
pub mod controller;
pub mod hotkeys;
pub mod logging;
pub mod notify;
pub mod platform;
pub mod registrar;
