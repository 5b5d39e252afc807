//! Message actions
//!
//! Opening messages, saving and sending drafts, and attachment uploads.

mod handler;

pub use handler::{ActionHandler, SendReport, SendTicket, UploadReport, UploadTicket};
