use rust_decimal::Decimal;

use crate::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlKind {
    Text,
    Checkbox,
    Radio,
    Select,
    Number,
}

/// The event shape the controller consumes: a field name, the raw value,
/// the kind of control that produced it, and the checked flag for checkbox
/// controls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldEvent {
    pub name: String,
    pub value: Value,
    pub control: ControlKind,
    pub checked: bool,
}

impl FieldEvent {
    pub fn input(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Text(value.into()),
            control: ControlKind::Text,
            checked: false,
        }
    }

    pub fn checkbox(name: impl Into<String>, checked: bool) -> Self {
        Self {
            name: name.into(),
            value: Value::Bool(checked),
            control: ControlKind::Checkbox,
            checked,
        }
    }

    pub fn radio(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Text(value.into()),
            control: ControlKind::Radio,
            checked: false,
        }
    }

    pub fn select(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Text(value.into()),
            control: ControlKind::Select,
            checked: false,
        }
    }

    pub fn number(name: impl Into<String>, value: impl Into<Decimal>) -> Self {
        Self {
            name: name.into(),
            value: Value::Number(value.into()),
            control: ControlKind::Number,
            checked: false,
        }
    }

    /// Checkbox controls read their checked flag; all others read the raw
    /// value.
    pub fn effective_value(&self) -> Value {
        if self.control == ControlKind::Checkbox {
            Value::Bool(self.checked)
        } else {
            self.value.clone()
        }
    }
}
