// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

use crate::cog::{CogId, CogState};

/// Cog core error type
#[derive(Debug, Clone)]
pub enum CogError {
    /// Cog handle does not resolve (destroyed or never issued)
    CogNotFound(CogId),

    /// Component not present on the cog
    ComponentNotFound(&'static str),

    /// Component add/remove rejected by dependency rules
    Dependency(DependencyError),

    /// Hierarchy operation error (cycle, self-attach, etc.)
    HierarchyError(String),

    /// Operation not legal in the cog's current lifecycle state
    InvalidState {
        cog: CogId,
        state: CogState,
        operation: &'static str,
    },

    /// Property path not understood by a component
    PropertyNotFound(String),

    /// Property value had the wrong shape for the target
    PropertyType { path: String, expected: &'static str },

    /// Component type has no registration (or no serde hooks)
    UnregisteredComponent(String),

    /// Operation references an object that can no longer be resolved
    OperationInvalid(String),

    /// Serialization error
    SerializationError(String),

    /// Deserialization error
    DeserializationError(String),

    /// Configuration could not be parsed
    ConfigError(String),
}

/// Reason a component addition or removal was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// A component of the exact same type is already present
    Duplicate { component: &'static str },

    /// A declared dependency is absent
    MissingDependency {
        component: &'static str,
        dependency: &'static str,
    },

    /// A component from the declared exclusivity set is present
    ExclusiveConflict {
        component: &'static str,
        existing: &'static str,
    },

    /// No ancestor carries the required component
    MissingAncestor {
        component: &'static str,
        ancestor: &'static str,
    },

    /// Another present component depends on this one
    RequiredBy {
        component: &'static str,
        dependent: &'static str,
    },
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyError::Duplicate { component } => {
                write!(f, "{component} is already present on this cog")
            }
            DependencyError::MissingDependency {
                component,
                dependency,
            } => {
                write!(f, "{component} depends on {dependency}, which is missing")
            }
            DependencyError::ExclusiveConflict {
                component,
                existing,
            } => {
                write!(f, "{component} cannot coexist with {existing}")
            }
            DependencyError::MissingAncestor {
                component,
                ancestor,
            } => {
                write!(f, "{component} requires an ancestor with {ancestor}")
            }
            DependencyError::RequiredBy {
                component,
                dependent,
            } => {
                write!(f, "{component} is required by {dependent}")
            }
        }
    }
}

impl std::error::Error for DependencyError {}

impl fmt::Display for CogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CogError::CogNotFound(id) => write!(f, "Cog not found: {id}"),
            CogError::ComponentNotFound(name) => write!(f, "Component not found: {name}"),
            CogError::Dependency(err) => write!(f, "Dependency violation: {err}"),
            CogError::HierarchyError(msg) => write!(f, "Hierarchy error: {msg}"),
            CogError::InvalidState {
                cog,
                state,
                operation,
            } => write!(f, "Cannot {operation} cog {cog} while {state:?}"),
            CogError::PropertyNotFound(path) => write!(f, "Property not found: {path}"),
            CogError::PropertyType { path, expected } => {
                write!(f, "Property {path} expects a {expected} value")
            }
            CogError::UnregisteredComponent(name) => {
                write!(f, "Component type not registered: {name}")
            }
            CogError::OperationInvalid(msg) => write!(f, "Operation invalid: {msg}"),
            CogError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            CogError::DeserializationError(msg) => write!(f, "Deserialization error: {msg}"),
            CogError::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for CogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CogError::Dependency(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DependencyError> for CogError {
    fn from(err: DependencyError) -> Self {
        CogError::Dependency(err)
    }
}

impl From<serde_json::Error> for CogError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            CogError::DeserializationError(err.to_string())
        } else {
            CogError::SerializationError(err.to_string())
        }
    }
}

impl CogError {
    /// Whether the error means the referenced object is gone for good
    pub fn is_stale_reference(&self) -> bool {
        matches!(
            self,
            CogError::CogNotFound(_) | CogError::ComponentNotFound(_) | CogError::OperationInvalid(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CogError>;
