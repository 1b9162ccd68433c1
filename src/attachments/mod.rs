pub mod services;

pub use services::{AttachmentError, AttachmentSaver};
