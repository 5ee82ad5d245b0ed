use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::value::{Value, ValueMap};

pub type RuleFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

type CheckFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
type CheckFn = Arc<dyn for<'a> Fn(&'a Value, &'a ValueMap) -> CheckFuture<'a> + Send + Sync>;

/// A single validation rule: a side-effect-free check of
/// `(value, all_values)` plus the message reported when the check fails.
/// Evaluation is uniform: synchronous checks are wrapped in ready futures
/// so the evaluation loop always awaits.
#[derive(Clone)]
pub struct Rule {
    name: &'static str,
    message: String,
    debounce: Option<Duration>,
    check: CheckFn,
}

impl Rule {
    pub fn check<F>(name: &'static str, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &ValueMap) -> bool + Send + Sync + 'static,
    {
        let wrapped: CheckFn = Arc::new(move |value, all_values| {
            let passed = check(value, all_values);
            Box::pin(std::future::ready(passed))
        });
        Self {
            name,
            message: message.into(),
            debounce: None,
            check: wrapped,
        }
    }

    pub fn check_async<F, Fut>(name: &'static str, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(Value, ValueMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let wrapped: CheckFn = Arc::new(move |value, all_values| {
            Box::pin(check(value.clone(), all_values.clone()))
        });
        Self {
            name,
            message: message.into(),
            debounce: None,
            check: wrapped,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    /// Resolves to `None` when the check passes and to the configured
    /// message when it fails.
    pub fn evaluate<'a>(&'a self, value: &'a Value, all_values: &'a ValueMap) -> RuleFuture<'a> {
        Box::pin(async move {
            if (self.check)(value, all_values).await {
                None
            } else {
                Some(self.message.clone())
            }
        })
    }
}

impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("message", &self.message)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// The declarative validation schema: field name to ordered rule list.
/// Built once and held by the controller for its lifetime.
#[derive(Clone, Default)]
pub struct Schema {
    fields: BTreeMap<String, Vec<Rule>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an ordered rule sequence for a field. Declaration order is
    /// evaluation order.
    pub fn field(
        mut self,
        name: impl Into<String>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Self {
        self.fields
            .entry(name.into())
            .or_default()
            .extend(rules);
        self
    }

    /// Single-rule form of [`Schema::field`].
    pub fn rule(self, name: impl Into<String>, rule: Rule) -> Self {
        self.field(name, [rule])
    }

    pub fn rules_for(&self, name: &str) -> Option<&[Rule]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
