use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_timer::Delay;

use crate::event::FieldEvent;
use crate::schema::Schema;
use crate::value::{ErrorMap, TouchedMap, Value, ValueMap};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

/// Generation stamp for one field's in-flight validation. A completed
/// evaluation writes its outcome only while its ticket is still the
/// field's latest; stale results are discarded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub validate_on_submit: bool,
    pub initial_errors: ErrorMap,
    pub initial_touched: TouchedMap,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            validate_on_blur: true,
            validate_on_submit: true,
            initial_errors: ErrorMap::new(),
            initial_touched: TouchedMap::new(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Clone, Debug)]
pub struct FormSnapshot {
    pub id: FormId,
    pub values: ValueMap,
    pub errors: ErrorMap,
    pub touched: TouchedMap,
    pub submitting: bool,
    pub submit_count: u32,
    pub is_valid: bool,
}

pub(crate) struct FormState {
    id: FormId,
    initial_values: ValueMap,
    initial_errors: ErrorMap,
    initial_touched: TouchedMap,
    values: ValueMap,
    errors: ErrorMap,
    touched: TouchedMap,
    submitting: bool,
    submit_count: u32,
    tickets: BTreeMap<String, ValidationTicket>,
}

impl FormState {
    fn next_ticket(&mut self, name: &str) -> ValidationTicket {
        let next = ValidationTicket(self.tickets.get(name).map_or(0, |ticket| ticket.0) + 1);
        self.tickets.insert(name.to_string(), next);
        next
    }
}

/// Owns the three state maps plus the submitting flag, and orchestrates
/// rule evaluation against them. Clones share state.
#[derive(Clone)]
pub struct FormController {
    options: FormOptions,
    schema: Arc<Schema>,
    state: Arc<RwLock<FormState>>,
}

impl FormController {
    pub fn new(initial_values: ValueMap, schema: Schema, options: FormOptions) -> Self {
        let state = FormState {
            id: FormId::next(),
            initial_values: initial_values.clone(),
            initial_errors: options.initial_errors.clone(),
            initial_touched: options.initial_touched.clone(),
            values: initial_values,
            errors: options.initial_errors.clone(),
            touched: options.initial_touched.clone(),
            submitting: false,
            submit_count: 0,
            tickets: BTreeMap::new(),
        };
        Self {
            options,
            schema: Arc::new(schema),
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    /// Evaluates `name`'s rules against `value` in declaration order,
    /// returning the first failing rule's message. No schema entry means
    /// no error. Reads `all_values` (defaulting to current values) and
    /// mutates nothing.
    pub async fn validate_field(
        &self,
        name: &str,
        value: &Value,
        all_values: Option<&ValueMap>,
    ) -> FormResult<Option<String>> {
        let Some(rules) = self.schema.rules_for(name) else {
            return Ok(None);
        };
        let current;
        let all_values = match all_values {
            Some(values) => values,
            None => {
                current = read_lock(&self.state, "reading values for field validation")?
                    .values
                    .clone();
                &current
            }
        };
        for rule in rules {
            if let Some(delay) = rule.debounce() {
                Delay::new(delay).await;
            }
            if let Some(message) = rule.evaluate(value, all_values).await {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }

    /// Validates each name in input order against current values, merging
    /// failures into the error map. Visited fields that pass are not
    /// cleared; unvisited fields are untouched. Returns whether every
    /// visited field passed.
    pub async fn validate_fields(&self, names: &[&str]) -> FormResult<bool> {
        let all_values = read_lock(&self.state, "reading values for validation pass")?
            .values
            .clone();
        self.validate_fields_with(names, &all_values).await
    }

    /// [`FormController::validate_fields`] against a caller-supplied value
    /// set instead of current values.
    pub async fn validate_fields_with(
        &self,
        names: &[&str],
        all_values: &ValueMap,
    ) -> FormResult<bool> {
        let mut failures = Vec::new();
        for name in names {
            let value = all_values.get(*name).cloned().unwrap_or(Value::Null);
            if let Some(message) = self.validate_field(name, &value, Some(all_values)).await? {
                failures.push((name.to_string(), message));
            }
        }
        let all_passed = failures.is_empty();
        if !all_passed {
            let mut state = write_lock(&self.state, "merging validation failures")?;
            for (name, message) in failures {
                state.next_ticket(&name);
                state.errors.insert(name, message);
            }
        }
        Ok(all_passed)
    }

    /// Full validation pass over every schema field.
    pub async fn validate(&self) -> FormResult<bool> {
        let names = self
            .schema
            .field_names()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let names = names.iter().map(String::as_str).collect::<Vec<_>>();
        self.validate_fields(&names).await
    }

    /// Applies a change event: writes the effective value, clears the
    /// field's error immediately, and revalidates only when change
    /// validation is on and the field was already touched. First-time
    /// typing on an untouched field never produces an error.
    pub async fn handle_change(&self, event: &FieldEvent) -> FormResult<()> {
        let name = event.name.as_str();
        let (ticket, should_validate) = {
            let mut state = write_lock(&self.state, "applying change event")?;
            state
                .values
                .insert(name.to_string(), event.effective_value());
            state.errors.remove(name);
            let ticket = state.next_ticket(name);
            let touched = state.touched.get(name).copied().unwrap_or(false);
            (ticket, self.options.validate_on_change && touched)
        };
        if should_validate {
            self.validate_field_ticketed(name, ticket).await?;
        }
        Ok(())
    }

    /// Applies a blur event: marks the field touched and, when blur
    /// validation is on, validates it against current values.
    pub async fn handle_blur(&self, event: &FieldEvent) -> FormResult<()> {
        let name = event.name.as_str();
        let (ticket, should_validate) = {
            let mut state = write_lock(&self.state, "applying blur event")?;
            state.touched.insert(name.to_string(), true);
            let ticket = state.next_ticket(name);
            (ticket, self.options.validate_on_blur)
        };
        if should_validate {
            self.validate_field_ticketed(name, ticket).await?;
        }
        Ok(())
    }

    /// Runs the submission flow: raises the submitting flag, optionally
    /// runs full validation (a failure blocks the callback and returns
    /// `false`), then awaits `on_submit` with a clone of current values.
    /// A callback error is reported through the log facade and never
    /// propagated; the submitting flag clears on every path.
    pub async fn submit<F, Fut, E>(&self, on_submit: F) -> FormResult<bool>
    where
        F: FnOnce(ValueMap) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        {
            let mut state = write_lock(&self.state, "preparing submit")?;
            state.submitting = true;
            state.submit_count = state.submit_count.saturating_add(1);
        }

        if self.options.validate_on_submit && !self.validate().await? {
            log::debug!("submit blocked by validation failures");
            write_lock(&self.state, "clearing submit flag after validation")?.submitting = false;
            return Ok(false);
        }

        let values = read_lock(&self.state, "reading values for submit")?
            .values
            .clone();
        let result = on_submit(values).await;
        write_lock(&self.state, "completing submit")?.submitting = false;
        if let Err(error) = result {
            log::error!("form submit handler failed: {error}");
        }
        Ok(true)
    }

    pub fn set_value(&self, name: impl Into<String>, value: impl Into<Value>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field value")?;
        state.values.insert(name.into(), value.into());
        Ok(())
    }

    pub fn set_error(&self, name: impl Into<String>, message: impl Into<String>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field error")?;
        state.errors.insert(name.into(), message.into());
        Ok(())
    }

    /// Removes the field from values, errors, and touched simultaneously.
    pub fn clear_field(&self, name: &str) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing field")?;
        state.values.remove(name);
        state.errors.remove(name);
        state.touched.remove(name);
        state.next_ticket(name);
        Ok(())
    }

    /// Restores values, errors, and touched to the constructor snapshots
    /// and clears the submitting flag. Outstanding validation tickets are
    /// invalidated.
    pub fn reset(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        state.values = state.initial_values.clone();
        state.errors = state.initial_errors.clone();
        state.touched = state.initial_touched.clone();
        state.submitting = false;
        state.tickets.clear();
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing all errors")?;
        state.errors.clear();
        Ok(())
    }

    /// True iff the field carries a non-empty error and is touched.
    /// Errors are never surfaced for untouched fields through here.
    pub fn has_error(&self, name: &str) -> FormResult<bool> {
        let state = read_lock(&self.state, "reading error visibility")?;
        let has_message = state.errors.get(name).is_some_and(|error| !error.is_empty());
        let touched = state.touched.get(name).copied().unwrap_or(false);
        Ok(has_message && touched)
    }

    pub fn values(&self) -> FormResult<ValueMap> {
        Ok(read_lock(&self.state, "reading values")?.values.clone())
    }

    pub fn value_of(&self, name: &str) -> FormResult<Option<Value>> {
        Ok(read_lock(&self.state, "reading field value")?
            .values
            .get(name)
            .cloned())
    }

    pub fn errors(&self) -> FormResult<ErrorMap> {
        Ok(read_lock(&self.state, "reading errors")?.errors.clone())
    }

    pub fn error_of(&self, name: &str) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(name)
            .cloned())
    }

    pub fn touched(&self) -> FormResult<TouchedMap> {
        Ok(read_lock(&self.state, "reading touched flags")?
            .touched
            .clone())
    }

    pub fn is_touched(&self, name: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched flag")?
            .touched
            .get(name)
            .copied()
            .unwrap_or(false))
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit flag")?.submitting)
    }

    pub fn submit_count(&self) -> FormResult<u32> {
        Ok(read_lock(&self.state, "reading submit count")?.submit_count)
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            id: state.id,
            values: state.values.clone(),
            errors: state.errors.clone(),
            touched: state.touched.clone(),
            submitting: state.submitting,
            submit_count: state.submit_count,
            is_valid: state.errors.values().all(String::is_empty),
        })
    }

    /// Ticketed single-field validation for the event paths. The outcome
    /// lands only while the ticket is still the field's latest; a rule
    /// debounce sleeps first and abandons the chain if a newer ticket
    /// arrived meanwhile.
    async fn validate_field_ticketed(&self, name: &str, ticket: ValidationTicket) -> FormResult<()> {
        let Some(rules) = self.schema.rules_for(name) else {
            return self.finish_validation(name, ticket, None);
        };
        let (value, all_values) = {
            let state = read_lock(&self.state, "reading state for ticketed validation")?;
            (
                state.values.get(name).cloned().unwrap_or(Value::Null),
                state.values.clone(),
            )
        };
        let mut outcome = None;
        for rule in rules {
            if let Some(delay) = rule.debounce() {
                Delay::new(delay).await;
                if !self.is_latest_ticket(name, ticket)? {
                    return Ok(());
                }
            }
            if let Some(message) = rule.evaluate(&value, &all_values).await {
                outcome = Some(message);
                break;
            }
        }
        self.finish_validation(name, ticket, outcome)
    }

    fn finish_validation(
        &self,
        name: &str,
        ticket: ValidationTicket,
        outcome: Option<String>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "finishing field validation")?;
        if state.tickets.get(name).copied() != Some(ticket) {
            log::debug!("discarding stale validation result for {name}");
            return Ok(());
        }
        match outcome {
            Some(message) => {
                state.errors.insert(name.to_string(), message);
            }
            None => {
                state.errors.remove(name);
            }
        }
        Ok(())
    }

    fn is_latest_ticket(&self, name: &str, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .tickets
            .get(name)
            .copied()
            == Some(ticket))
    }
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
