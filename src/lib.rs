pub mod binding;
pub mod controller;
pub mod event;
pub mod rules;
pub mod schema;
pub mod value;


pub use binding::FieldBinding;
pub use controller::{
    FormController, FormError, FormId, FormOptions, FormResult, FormSnapshot, ValidationTicket,
};
pub use event::{ControlKind, FieldEvent};
pub use schema::{Rule, RuleFuture, Schema};
pub use value::{ErrorMap, TouchedMap, Value, ValueMap};
