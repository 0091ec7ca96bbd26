// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use thiserror::Error;

/// Errors of the form engine
///
/// User input problems (a missing required value, a date in the past) are never
/// reported through this type, they surface as `false` from the validation calls.
#[derive(Debug, Error)]
pub enum FormError {
    /// A field could not compute its value from the current controls
    #[error("field `{field}` is not ready: {reason}")]
    NotReady { field: String, reason: String },

    /// A value handed to a field does not have the shape the field expects
    #[error("field `{field}` rejected value `{value}`: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("field `{0}` is defined more than once")]
    DuplicateField(String),

    #[error("field `{field}` depends on unknown field `{dependency}`")]
    UnknownDependency { field: String, dependency: String },

    #[error("dependency cycle between fields: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// The node a field should render into does not exist in the document
    #[error("cannot attach `{field}` to node #{node}: no such node")]
    DomAttach { field: String, node: usize },

    #[error("malformed metadata document: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FormError {
    pub(crate) fn not_ready(field: &str, reason: impl Into<String>) -> Self {
        Self::NotReady {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_owned(),
            value: value.to_owned(),
            reason: reason.into(),
        }
    }

    /// Whether this error stems from the field contents rather than from the program
    pub fn is_user_input(&self) -> bool {
        matches!(self, Self::NotReady { .. } | Self::InvalidValue { .. })
    }
}

pub type Result<T, E = FormError> = std::result::Result<T, E>;
