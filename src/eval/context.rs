use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::expression::ExpressionEvaluator;
use crate::config::ParseMode;
use crate::function::FunctionRegistry;
use crate::model::{DataField, InvalidValueTreatment, ModelSchema};
use crate::value::{coerce, FieldValue, Value};
use crate::{EvalResult, FieldError};

/// Per-record resolver from field names to typed values.
///
/// Every field is resolved at most once: the first `evaluate` of a derived
/// field runs its expression and memoizes the result, later calls return
/// the memo. A context belongs to one thread and one record at a time;
/// [`reset`](EvaluationContext::reset) prepares it for the next record.
pub struct EvaluationContext<'a> {
    schema: &'a ModelSchema,
    functions: &'a FunctionRegistry,
    parse_mode: ParseMode,
    arguments: Cow<'a, HashMap<String, Value>>,
    values: HashMap<String, FieldValue>,
    declared: HashSet<String>,
    in_progress: HashSet<String>,
    scope_stack: ScopeStack,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(schema: &'a ModelSchema, functions: &'a FunctionRegistry, parse_mode: ParseMode) -> Self {
        Self {
            schema,
            functions,
            parse_mode,
            arguments: Cow::Owned(HashMap::new()),
            values: HashMap::new(),
            declared: HashSet::new(),
            in_progress: HashSet::new(),
            scope_stack: ScopeStack::new(),
        }
    }

    /// Sets the raw input record. Inputs are prepared lazily on first use.
    pub fn set_arguments(&mut self, arguments: HashMap<String, Value>) {
        self.arguments = Cow::Owned(arguments);
    }

    /// Like [`set_arguments`](EvaluationContext::set_arguments) without
    /// copying the caller's record.
    pub fn borrow_arguments(&mut self, arguments: &'a HashMap<String, Value>) {
        self.arguments = Cow::Borrowed(arguments);
    }

    pub fn schema(&self) -> &'a ModelSchema {
        self.schema
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Seeds a value without going through preparation or expressions.
    pub fn declare<S: Into<String>>(&mut self, name: S, value: FieldValue) -> EvalResult<()> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(FieldError::AlreadyDeclared(name).into());
        }
        self.declared.insert(name.clone());
        self.values.insert(name, value);
        Ok(())
    }

    /// The resolved value of `name`, computing it when the schema says how.
    pub fn lookup(&mut self, name: &str) -> EvalResult<FieldValue> {
        if self.scope_stack.is_active() {
            return self.scoped(name);
        }
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if self.is_computable(name) {
            return self.evaluate(name);
        }
        Err(FieldError::MissingFieldValue(name.to_string()).into())
    }

    fn is_computable(&self, name: &str) -> bool {
        self.schema.derived_field(name).is_some() || self.schema.data_field(name).is_some()
    }

    /// Resolves `name`, memoizing the result for the rest of the record.
    ///
    /// Inside a user-defined function only its parameters resolve, and they
    /// are never memoized.
    pub fn evaluate(&mut self, name: &str) -> EvalResult<FieldValue> {
        if self.scope_stack.is_active() {
            return self.scoped(name);
        }
        if let Some(value) = self.values.get(name) {
            trace!("Memoized value for {}", name);
            return Ok(value.clone());
        }

        let schema = self.schema;
        let value = if let Some(field) = schema.derived_field(name) {
            if !self.in_progress.insert(name.to_string()) {
                return Err(FieldError::CyclicReference(name.to_string()).into());
            }
            // Derived fields never see the parameters of a calling function.
            let scopes = std::mem::take(&mut self.scope_stack);
            let result = ExpressionEvaluator::new().evaluate(&field.expression, self);
            self.scope_stack = scopes;
            self.in_progress.remove(name);
            match result? {
                FieldValue::Missing => FieldValue::Missing,
                FieldValue::Present(value) => FieldValue::Present(value.cast(
                    field.data_type,
                    field.op_type(),
                    self.parse_mode,
                )?),
            }
        } else if let Some(field) = schema.data_field(name) {
            self.prepare(field)?
        } else {
            return Err(FieldError::UnknownField(name.to_string()).into());
        };

        self.values.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn scoped(&self, name: &str) -> EvalResult<FieldValue> {
        self.scope_stack
            .lookup(name)
            .cloned()
            .ok_or_else(|| FieldError::UnknownField(name.to_string()).into())
    }

    /// Missing-token detection, coercion and domain check of one input.
    fn prepare(&self, field: &DataField) -> EvalResult<FieldValue> {
        let mining_field = self.schema.mining_field(&field.name);
        let treatment = mining_field
            .map(|mining_field| mining_field.invalid_value_treatment)
            .unwrap_or_default();
        let raw = self.arguments.get(&field.name).unwrap_or(&Value::Null);

        if raw.is_null() || field.is_missing_token(raw) {
            let replacement = mining_field.and_then(|mining_field| mining_field.missing_value_replacement.as_ref());
            return match replacement {
                Some(replacement) => self.coerce(field, replacement),
                None => Ok(FieldValue::Missing),
            };
        }

        let value = match self.coerce(field, raw) {
            Ok(value) => value,
            Err(_) if treatment == InvalidValueTreatment::AsMissing => return Ok(FieldValue::Missing),
            Err(e) => return Err(e),
        };
        let Some(typed) = value.as_typed() else {
            return Ok(value);
        };
        if field.is_valid(typed)? {
            return Ok(value);
        }
        match treatment {
            InvalidValueTreatment::ReturnInvalid => Err(FieldError::InvalidValue {
                field: field.name.clone(),
                value: raw.to_string(),
            }
            .into()),
            InvalidValueTreatment::AsIs => Ok(value),
            InvalidValueTreatment::AsMissing => Ok(FieldValue::Missing),
        }
    }

    fn coerce(&self, field: &DataField, raw: &Value) -> EvalResult<FieldValue> {
        let value = coerce(field.data_type, field.op_type(), raw, self.parse_mode)?;
        Ok(match (value, field.ordering()) {
            (FieldValue::Present(typed), Some(ordering)) => FieldValue::Present(typed.with_ordering(ordering)),
            (value, _) => value,
        })
    }

    /// Clears memoized results; with `clear_declared` also the seeded values
    /// and the raw record.
    pub fn reset(&mut self, clear_declared: bool) {
        if clear_declared {
            self.values.clear();
            self.declared.clear();
            self.arguments = Cow::Owned(HashMap::new());
        } else {
            let declared = &self.declared;
            self.values.retain(|name, _| declared.contains(name));
        }
        self.in_progress.clear();
        self.scope_stack = ScopeStack::new();
    }

    pub(crate) fn push_scope(&mut self, scope: Scope) {
        self.scope_stack.push_scope(scope);
    }

    pub(crate) fn pop_scope(&mut self) -> Option<Scope> {
        self.scope_stack.pop_scope()
    }
}

/// Parameter bindings of one user-defined function call.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, FieldValue>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, value: FieldValue) -> Option<FieldValue> {
        self.variables.insert(name.into(), value)
    }

    pub fn lookup(&self, name: &str) -> Option<&FieldValue> {
        self.variables.get(name)
    }
}

/// Function bodies see only their own parameters, so lookups consult the
/// innermost scope alone and never fall through to fields.
#[derive(Debug, Default)]
struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    fn new() -> Self {
        Self::default()
    }

    fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    fn is_active(&self) -> bool {
        !self.scopes.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&FieldValue> {
        self.scopes.last().and_then(|scope| scope.lookup(name))
    }
}
