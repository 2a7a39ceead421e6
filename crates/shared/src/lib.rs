//! Vocabulary shared by the session, the control core and the panel app.

pub mod domain;
pub mod error;
pub mod protocol;
