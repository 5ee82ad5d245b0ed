use crate::controller::{FormController, FormResult};
use crate::event::{ControlKind, FieldEvent};
use crate::value::Value;

/// The attachable bundle for one input: the field name, its current value,
/// the touched-gated error, and change/blur operations that route through
/// the controller's event handlers.
#[derive(Clone)]
pub struct FieldBinding {
    name: String,
    controller: FormController,
}

impl FormController {
    pub fn field_binding(&self, name: impl Into<String>) -> FieldBinding {
        FieldBinding {
            name: name.into(),
            controller: self.clone(),
        }
    }
}

impl FieldBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value, defaulting to empty text when unset.
    pub fn value(&self) -> FormResult<Value> {
        Ok(self
            .controller
            .value_of(&self.name)?
            .unwrap_or_else(|| Value::text("")))
    }

    /// The field's error message, gated the same way as
    /// [`FormController::has_error`]: untouched fields display nothing.
    pub fn display_error(&self) -> FormResult<Option<String>> {
        if self.controller.has_error(&self.name)? {
            self.controller.error_of(&self.name)
        } else {
            Ok(None)
        }
    }

    pub async fn change(&self, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        let event = match value {
            Value::Bool(checked) => FieldEvent::checkbox(self.name.clone(), checked),
            other => FieldEvent {
                name: self.name.clone(),
                value: other,
                control: ControlKind::Text,
                checked: false,
            },
        };
        self.controller.handle_change(&event).await
    }

    pub async fn blur(&self) -> FormResult<()> {
        let event = FieldEvent::input(self.name.clone(), "");
        self.controller.handle_blur(&event).await
    }
}
