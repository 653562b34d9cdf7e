//! Property values and the mutation context used to capture side effects.
//!
//! Setting a property can make a component change other properties of its
//! own (a path setter that also refreshes a cached resolved name, say). The
//! [`MutationContext`] is passed explicitly into every setter so those
//! derived changes can be recorded against their full property path and
//! replayed by the undo system.

use serde::{Deserialize, Serialize};

use crate::error::{CogError, Result};

/// Dynamic property value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
            PropertyValue::Json(_) => "json",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Ints widen to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Typed accessors that produce a [`CogError::PropertyType`] naming the path
    pub fn expect_bool(&self, path: &str) -> Result<bool> {
        self.as_bool().ok_or_else(|| type_error(path, "bool"))
    }

    pub fn expect_int(&self, path: &str) -> Result<i64> {
        self.as_int().ok_or_else(|| type_error(path, "int"))
    }

    pub fn expect_float(&self, path: &str) -> Result<f64> {
        self.as_float().ok_or_else(|| type_error(path, "float"))
    }

    pub fn expect_string(&self, path: &str) -> Result<String> {
        self.as_str()
            .map(str::to_string)
            .ok_or_else(|| type_error(path, "string"))
    }
}

fn type_error(path: &str, expected: &'static str) -> CogError {
    CogError::PropertyType {
        path: path.to_string(),
        expected,
    }
}

macro_rules! impl_from_value {
    ($($t:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$t> for PropertyValue {
                fn from(value: $t) -> Self {
                    PropertyValue::$variant(value as $cast)
                }
            }
        )*
    };
}

impl_from_value!(
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        PropertyValue::Json(value)
    }
}

/// Derived property change recorded while applying an outer edit
#[derive(Clone, Debug, PartialEq)]
pub struct SideEffect {
    /// Dotted path relative to the component being edited
    pub path: String,
    pub old: PropertyValue,
    pub new: PropertyValue,
}

/// Threaded through property setters so nested changes can be captured
#[derive(Debug, Default)]
pub struct MutationContext {
    capturing: bool,
    path_stack: Vec<String>,
    side_effects: Vec<SideEffect>,
}

impl MutationContext {
    /// Context that drops every side effect
    pub fn discarding() -> Self {
        Self::default()
    }

    /// Context that records side effects for the undo system
    pub fn capturing() -> Self {
        Self {
            capturing: true,
            ..Self::default()
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Enter a nested object so recorded paths get prefixed with `name`
    pub fn push_sub_property(&mut self, name: impl Into<String>) {
        self.path_stack.push(name.into());
    }

    pub fn pop_sub_property(&mut self) -> Option<String> {
        self.path_stack.pop()
    }

    /// Current nesting as a dotted prefix (empty at the top level)
    pub fn current_path(&self) -> String {
        self.path_stack.join(".")
    }

    pub fn record_side_effect(
        &mut self,
        name: &str,
        old: impl Into<PropertyValue>,
        new: impl Into<PropertyValue>,
    ) {
        if !self.capturing {
            return;
        }
        let path = if self.path_stack.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.current_path())
        };
        tracing::trace!(%path, "captured property side effect");
        self.side_effects.push(SideEffect {
            path,
            old: old.into(),
            new: new.into(),
        });
    }

    pub fn side_effects(&self) -> &[SideEffect] {
        &self.side_effects
    }

    pub fn take_side_effects(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.side_effects)
    }
}
