//! Backend side of the panel: the command vocabulary and the worker thread that owns the
//! host session.

pub mod commands;
pub mod runtime;
