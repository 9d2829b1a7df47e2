//! Environments and registries
//!
//! An Environment owns three independent, insertion-ordered registries keyed
//! by symbol: bound values, special forms and data types. Environments form
//! a chain of scopes, with child environments referencing their parents.
//! Lookups walk the chain; definitions always land in the current scope.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use im::OrdMap as ImOrdMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::EvalConfig;
use crate::datatypes::DataType;
use crate::error::{EvalResult, InterpreterError};
use crate::interner::Symbol;
use crate::language::{SpecialForm, Value};

// ============================================================================
// Registry
// ============================================================================

/// Insertion-ordered symbol table. Rebinding keeps the original position.
struct Registry<T> {
    entries: Vec<(Symbol, T)>,
    index: FxHashMap<Symbol, usize>,
}

impl<T: Clone> Registry<T> {
    fn new() -> Self {
        Registry {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    fn insert(&mut self, name: Symbol, value: T) {
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    fn get(&self, name: Symbol) -> Option<&T> {
        self.index.get(&name).map(|&pos| &self.entries[pos].1)
    }

    fn remove(&mut self, name: Symbol) -> Option<T> {
        let pos = self.index.remove(&name)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = &(Symbol, T)> {
        self.entries.iter()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable copy of an environment's registries, as produced by
/// [`Environment::export`] and consumed by [`Environment::merge`].
#[derive(Clone, Default)]
pub struct Snapshot {
    values: Vec<(Symbol, Value)>,
    forms: Vec<(Symbol, Arc<SpecialForm>)>,
    types: Vec<(Symbol, Arc<DataType>)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<Symbol>, value: Value) -> Self {
        self.values.push((name.into(), value));
        self
    }

    pub fn with_form(mut self, name: impl Into<Symbol>, form: Arc<SpecialForm>) -> Self {
        self.forms.push((name.into(), form));
        self
    }

    pub fn with_type(mut self, name: impl Into<Symbol>, data_type: Arc<DataType>) -> Self {
        self.types.push((name.into(), data_type));
        self
    }

    pub fn values(&self) -> &[(Symbol, Value)] {
        &self.values
    }

    pub fn forms(&self) -> &[(Symbol, Arc<SpecialForm>)] {
        &self.forms
    }

    pub fn types(&self) -> &[(Symbol, Arc<DataType>)] {
        &self.types
    }

    /// Bound value of `name` in the snapshot
    pub fn get(&self, name: impl Into<Symbol>) -> Option<&Value> {
        let name = name.into();
        self.values
            .iter()
            .rev()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.forms.len() + self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bound values as an object keyed by name
    pub fn to_object(&self) -> Value {
        let map: ImOrdMap<String, Value> = self
            .values
            .iter()
            .map(|(name, value)| (name.resolve(), value.clone()))
            .collect();
        Value::Object(Arc::new(map))
    }
}

// ============================================================================
// Environment
// ============================================================================

// Shared by every environment created from the same root.
struct Session {
    config: EvalConfig,
    depth: AtomicUsize,
}

// Internal state holding the registries and parent pointer
struct EnvironmentState {
    values: Registry<Value>,
    forms: Registry<Arc<SpecialForm>>,
    types: Registry<Arc<DataType>>,
    parent: Option<Environment>,
}

impl EnvironmentState {
    fn empty(parent: Option<Environment>) -> Self {
        EnvironmentState {
            values: Registry::new(),
            forms: Registry::new(),
            types: Registry::new(),
            parent,
        }
    }
}

/// Environment for symbol bindings.
///
/// Cheap to clone (an `Arc` increment); clones share the same scope.
#[derive(Clone)]
pub struct Environment {
    state: Arc<RwLock<EnvironmentState>>,
    session: Arc<Session>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Environment")
            .field("values", &state.values.entries.len())
            .field("forms", &state.forms.entries.len())
            .field("types", &state.types.entries.len())
            .field("has_parent", &state.parent.is_some())
            .finish()
    }
}

impl Environment {
    /// Create a new, empty root environment
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    /// Create a new, empty root environment with the given limits
    pub fn with_config(config: EvalConfig) -> Self {
        Environment {
            state: Arc::new(RwLock::new(EnvironmentState::empty(None))),
            session: Arc::new(Session {
                config,
                depth: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> EvalConfig {
        self.session.config
    }

    fn read(&self) -> RwLockReadGuard<'_, EnvironmentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EnvironmentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn parent(&self) -> Option<Environment> {
        self.read().parent.clone()
    }

    /// Create an empty child scope
    pub fn child(&self) -> Self {
        Environment {
            state: Arc::new(RwLock::new(EnvironmentState::empty(Some(self.clone())))),
            session: Arc::clone(&self.session),
        }
    }

    /// Create a child scope binding `params` to `args`
    pub fn extend(&self, params: &[Symbol], args: &[Value]) -> Self {
        let scope = self.child();
        {
            let mut state = scope.write();
            for (param, arg) in params.iter().zip(args.iter()) {
                state.values.insert(*param, arg.clone());
            }
        }
        scope
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    /// Bind a value in the CURRENT scope, replacing any previous binding
    pub fn bind(&self, name: impl Into<Symbol>, value: Value) {
        self.write().values.insert(name.into(), value);
    }

    /// Look up a bound value, walking up the parent chain
    pub fn lookup(&self, name: impl Into<Symbol>) -> Option<Value> {
        let name = name.into();
        let mut scope = Some(self.clone());
        while let Some(env) = scope {
            let state = env.read();
            if let Some(value) = state.values.get(name) {
                return Some(value.clone());
            }
            scope = state.parent.clone();
        }
        None
    }

    /// Is `name` bound to a value in this scope or a parent?
    pub fn contains(&self, name: impl Into<Symbol>) -> bool {
        self.lookup(name).is_some()
    }

    /// Remove a binding from the CURRENT scope, returning it
    pub fn unbind(&self, name: impl Into<Symbol>) -> Option<Value> {
        let name = name.into();
        let removed = self.write().values.remove(name);
        if removed.is_some() {
            debug!(%name, "unbound value");
        }
        removed
    }

    // ------------------------------------------------------------------------
    // Special forms and data types
    // ------------------------------------------------------------------------

    /// Register a special form under its own name in the CURRENT scope
    pub fn define_form(&self, form: SpecialForm) -> Arc<SpecialForm> {
        let form = Arc::new(form);
        debug!(name = %form.name, "registered special form");
        self.write().forms.insert(form.name, Arc::clone(&form));
        form
    }

    pub fn lookup_form(&self, name: impl Into<Symbol>) -> Option<Arc<SpecialForm>> {
        let name = name.into();
        let mut scope = Some(self.clone());
        while let Some(env) = scope {
            let state = env.read();
            if let Some(form) = state.forms.get(name) {
                return Some(Arc::clone(form));
            }
            scope = state.parent.clone();
        }
        None
    }

    /// Register a data type under its label in the CURRENT scope
    pub fn define_type(&self, data_type: Arc<DataType>) {
        debug!(label = %data_type.label, "registered data type");
        self.write().types.insert(data_type.label, data_type);
    }

    pub fn lookup_type(&self, name: impl Into<Symbol>) -> Option<Arc<DataType>> {
        let name = name.into();
        let mut scope = Some(self.clone());
        while let Some(env) = scope {
            let state = env.read();
            if let Some(data_type) = state.types.get(name) {
                return Some(Arc::clone(data_type));
            }
            scope = state.parent.clone();
        }
        None
    }

    /// Definition of `name`: bound values first, then special forms, then
    /// data types.
    pub fn resolve(&self, name: Symbol) -> Option<Value> {
        self.lookup(name)
            .or_else(|| self.lookup_form(name).map(Value::Form))
            .or_else(|| self.lookup_type(name).map(Value::DataType))
    }

    /// Is `name` present in any registry?
    pub fn is_registered(&self, name: Symbol) -> bool {
        self.resolve(name).is_some()
    }

    // ------------------------------------------------------------------------
    // Import / export
    // ------------------------------------------------------------------------

    /// Snapshot of every registry visible from this scope. Inner scopes
    /// shadow outer ones.
    pub fn export(&self) -> Snapshot {
        let mut chain = vec![self.clone()];
        while let Some(parent) = chain.last().and_then(Environment::parent) {
            chain.push(parent);
        }

        let mut values = Registry::new();
        let mut forms = Registry::new();
        let mut types = Registry::new();
        for env in chain.iter().rev() {
            let state = env.read();
            for (name, value) in state.values.iter() {
                values.insert(*name, value.clone());
            }
            for (name, form) in state.forms.iter() {
                forms.insert(*name, Arc::clone(form));
            }
            for (name, data_type) in state.types.iter() {
                types.insert(*name, Arc::clone(data_type));
            }
        }

        Snapshot {
            values: values.entries,
            forms: forms.entries,
            types: types.entries,
        }
    }

    /// Install every definition of `snapshot` into the CURRENT scope.
    ///
    /// Nothing is installed when a special form or data type is filed under
    /// a name other than its own.
    pub fn merge(&self, snapshot: &Snapshot) -> EvalResult<()> {
        for (name, form) in &snapshot.forms {
            if *name != form.name {
                return Err(InterpreterError::module(
                    "merge",
                    format!("special form {} exported as {name}", form.name),
                ));
            }
        }
        for (name, data_type) in &snapshot.types {
            if *name != data_type.label {
                return Err(InterpreterError::module(
                    "merge",
                    format!("data type {} exported as {name}", data_type.label),
                ));
            }
        }

        let mut state = self.write();
        for (name, value) in &snapshot.values {
            state.values.insert(*name, value.clone());
        }
        for (name, form) in &snapshot.forms {
            state.forms.insert(*name, Arc::clone(form));
        }
        for (name, data_type) in &snapshot.types {
            state.types.insert(*name, Arc::clone(data_type));
        }
        debug!(entries = snapshot.len(), "merged snapshot");
        Ok(())
    }

    /// Install bindings from an untyped module value: an object, or an
    /// association list keyed by symbols or strings.
    pub fn merge_value(&self, module: &Value) -> EvalResult<()> {
        let bindings: Vec<(Symbol, Value)> = match module {
            Value::Object(obj) => obj
                .iter()
                .map(|(key, value)| (Symbol::new(key), value.clone()))
                .collect(),
            Value::Nil | Value::Pair(_) => module_alist(module)?,
            other => {
                return Err(InterpreterError::module(
                    "merge",
                    format!("module exports not found in {}", other.type_name()),
                ));
            }
        };

        let mut state = self.write();
        for (name, value) in bindings {
            state.values.insert(name, value);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Evaluation depth
    // ------------------------------------------------------------------------

    /// Account for one nested evaluation; the guard releases it on drop.
    pub(crate) fn enter(&self) -> EvalResult<DepthGuard> {
        let depth = self.session.depth.fetch_add(1, Ordering::Relaxed) + 1;
        let guard = DepthGuard {
            session: Arc::clone(&self.session),
        };
        if depth > self.session.config.max_depth {
            return Err(InterpreterError::evaluation(
                "eval",
                format!(
                    "maximum evaluation depth {} exceeded",
                    self.session.config.max_depth
                ),
            ));
        }
        Ok(guard)
    }
}

pub(crate) struct DepthGuard {
    session: Arc<Session>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.session.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

fn module_alist(module: &Value) -> EvalResult<Vec<(Symbol, Value)>> {
    let mut bindings = Vec::new();
    let mut current = module;
    while let Value::Pair(cell) = current {
        let entry = match &cell.car {
            Value::Pair(entry) => entry,
            other => {
                return Err(InterpreterError::module(
                    "merge",
                    format!("malformed module entry {other}"),
                ));
            }
        };
        let name = match &entry.car {
            Value::Symbol(sym) => *sym,
            Value::String(s) => Symbol::new(s),
            other => {
                return Err(InterpreterError::module(
                    "merge",
                    format!("module key must be a symbol or string, got {other}"),
                ));
            }
        };
        bindings.push((name, entry.cdr.clone()));
        current = &cell.cdr;
    }
    if !current.is_nil() {
        return Err(InterpreterError::module(
            "merge",
            format!("module exports must be a proper list, got tail {current}"),
        ));
    }
    Ok(bindings)
}
