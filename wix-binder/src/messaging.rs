// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diagnostic reporting.

use {
    log::{debug, error, warn},
    std::fmt::{Display, Formatter},
    thiserror::Error,
};

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Severity {
    Error,
    Warning,
    Verbose,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Verbose => "verbose",
        })
    }
}

/// A problem or observation reported while binding.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Diagnostic {
    #[error("table {0} is defined differently in the target and updated outputs")]
    DatabaseSchemaMismatch(String),

    #[error("duplicate key {key} in table {table}; keeping the {kept} row")]
    DuplicatePrimaryKey {
        table: String,
        key: String,
        kept: &'static str,
    },

    #[error("the {0} output has ProductCode '*', which is not allowed in a transform")]
    InvalidProductCodeInTransform(&'static str),

    #[error("codepage changes from {target} to {updated} without the change codepage flag")]
    CodepageMismatch { target: String, updated: String },

    #[error("unresolved variable {name} in {context}")]
    UnresolvedVariable { name: String, context: String },

    #[error("file {path} referenced by {table}/{key} was not found")]
    FileNotFound {
        path: String,
        table: String,
        key: String,
    },

    #[error("failed to generate transform {path}: {message}")]
    TransformGenerationFailed { path: String, message: String },

    #[error("failed to create cabinet {name}: {message}")]
    CabinetCreationFailed { name: String, message: String },

    #[error("reusing cached cabinet {0}")]
    ReusingCabinet(String),

    #[error("file {0} has no sequence number; using 1")]
    DefaultedFileSequence(String),

    #[error("unable to delete temporary files in {path}: {message}")]
    TempCleanupFailed { path: String, message: String },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Self::DatabaseSchemaMismatch(_)
            | Self::InvalidProductCodeInTransform(_)
            | Self::CodepageMismatch { .. }
            | Self::UnresolvedVariable { .. }
            | Self::FileNotFound { .. }
            | Self::TransformGenerationFailed { .. }
            | Self::CabinetCreationFailed { .. } => Severity::Error,
            Self::DuplicatePrimaryKey { .. } | Self::TempCleanupFailed { .. } => Severity::Warning,
            Self::ReusingCabinet(_) | Self::DefaultedFileSequence(_) => Severity::Verbose,
        }
    }
}

/// A diagnostic with the severity it was recorded at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub severity: Severity,
    pub diagnostic: Diagnostic,
}

/// Collects diagnostics and remembers whether any error was seen.
///
/// Every message is also forwarded to the `log` facade.
#[derive(Clone, Debug, Default)]
pub struct Messaging {
    messages: Vec<Message>,
    encountered_error: bool,
    warnings_as_errors: bool,
}

impl Messaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote all warnings to errors.
    pub fn set_warnings_as_errors(&mut self, value: bool) {
        self.warnings_as_errors = value;
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        let severity = match diagnostic.severity() {
            Severity::Warning if self.warnings_as_errors => Severity::Error,
            s => s,
        };

        match severity {
            Severity::Error => {
                error!("{}", diagnostic);
                self.encountered_error = true;
            }
            Severity::Warning => warn!("{}", diagnostic),
            Severity::Verbose => debug!("{}", diagnostic),
        }

        self.messages.push(Message {
            severity,
            diagnostic,
        });
    }

    /// Whether an error has been emitted. Never resets.
    pub fn encountered_error(&self) -> bool {
        self.encountered_error
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(Severity::Warning)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.messages
            .iter()
            .filter(move |m| m.severity == severity)
            .map(|m| &m.diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_flag_is_sticky() {
        let mut messaging = Messaging::new();
        assert!(!messaging.encountered_error());

        messaging.emit(Diagnostic::ReusingCabinet("a.cab".into()));
        assert!(!messaging.encountered_error());

        messaging.emit(Diagnostic::DatabaseSchemaMismatch("File".into()));
        assert!(messaging.encountered_error());

        messaging.emit(Diagnostic::DefaultedFileSequence("f".into()));
        assert!(messaging.encountered_error());

        assert_eq!(messaging.messages().len(), 3);
        assert_eq!(messaging.errors().count(), 1);
    }

    #[test]
    fn warnings_as_errors() {
        let mut messaging = Messaging::new();
        messaging.set_warnings_as_errors(true);

        messaging.emit(Diagnostic::DuplicatePrimaryKey {
            table: "Property".into(),
            key: "A".into(),
            kept: "first",
        });

        assert!(messaging.encountered_error());
        assert_eq!(messaging.warnings().count(), 0);
        assert_eq!(messaging.messages()[0].severity, Severity::Error);
    }
}
