//! Input validation subsystem.
//!
//! # Data Flow
//! ```text
//! JSON body (serde_json::Value, untrusted)
//!     → forms.rs (pick fields, reject missing / mistyped)
//!     → fields.rs (trim, normalize, check rules per field)
//!     → FormResult::Valid(typed form) | FormResult::Invalid(messages)
//!
//! Free text echoed to people:
//!     → sanitize.rs (strip markup, fixpoint)
//! ```
//!
//! # Design Decisions
//! - Allow-lists over block-lists for names and slugs
//! - Every broken rule is reported, not only the first
//! - Forms are plain structs; handlers never touch the raw body again

pub mod fields;
pub mod forms;
pub mod sanitize;

pub use fields::Role;
pub use forms::{
    validate_form, AdminLogin, CreateEvent, FormResult, FormSchema, NotifyForm, RequestForm,
    RsvpForm, UpdateEvent,
};
pub use sanitize::sanitize_input;
