// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Variable substitution and file resolution.

Field values may reference variables with `!(wix.Name)`, `!(wix.Name=default)`,
`!(loc.Name)` or `!(bind.Name)`. The first two forms are resolved from WiX
variables, `loc` from localization strings. `bind` references are resolved
late, after files are known, and are left untouched here. `!!(` escapes a
literal `!(`.
*/

use {
    crate::{
        messaging::{Diagnostic, Messaging},
        output::Output,
        row::{ObjectSource, Row, Value},
        table::ColumnType,
        transform::Transform,
    },
    log::debug,
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Resolves `wix` and `loc` variable references.
#[derive(Clone, Debug, Default)]
pub struct VariableResolver {
    wix_variables: BTreeMap<String, String>,
    localizations: BTreeMap<String, String>,
}

impl VariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_wix_variable(&mut self, name: impl ToString, value: impl ToString) {
        self.wix_variables.insert(name.to_string(), value.to_string());
    }

    pub fn add_localization(&mut self, name: impl ToString, value: impl ToString) {
        self.localizations.insert(name.to_string(), value.to_string());
    }

    /// Substitute variables in a string.
    ///
    /// Returns the substituted string and the names of variables that could
    /// not be resolved. Unresolved references are kept verbatim.
    pub fn resolve_str(&self, value: &str) -> (String, Vec<String>) {
        let mut result = String::with_capacity(value.len());
        let mut unresolved = vec![];
        let mut rest = value;

        while let Some(start) = rest.find("!(") {
            if start > 0 && rest.as_bytes()[start - 1] == b'!' {
                result.push_str(&rest[..start - 1]);
                result.push_str("!(");
                rest = &rest[start + 2..];
                continue;
            }

            result.push_str(&rest[..start]);
            let reference = &rest[start..];

            let end = match reference.find(')') {
                Some(end) => end,
                None => {
                    result.push_str(reference);
                    rest = "";
                    break;
                }
            };

            let body = &reference[2..end];
            let verbatim = &reference[..=end];

            match self.resolve_reference(body) {
                Some(Resolution::Value(v)) => result.push_str(&v),
                Some(Resolution::Late) => result.push_str(verbatim),
                None => {
                    unresolved.push(body.to_string());
                    result.push_str(verbatim);
                }
            }

            rest = &reference[end + 1..];
        }

        result.push_str(rest);

        (result, unresolved)
    }

    fn resolve_reference(&self, body: &str) -> Option<Resolution> {
        let (scope, name) = body.split_once('.')?;

        match scope {
            "wix" => {
                let (name, default) = match name.split_once('=') {
                    Some((name, default)) => (name, Some(default)),
                    None => (name, None),
                };

                self.wix_variables
                    .get(name)
                    .map(|v| v.as_str())
                    .or(default)
                    .map(|v| Resolution::Value(v.to_string()))
            }
            "loc" => self
                .localizations
                .get(name)
                .map(|v| Resolution::Value(v.clone())),
            "bind" => Some(Resolution::Late),
            _ => None,
        }
    }

    fn resolve_row(&self, row: &mut Row, messaging: &mut Messaging) {
        let context = format!(
            "{}/{}",
            row.table_name(),
            row.primary_key().unwrap_or_else(|| row.to_key_string())
        );

        for field in row.fields_mut() {
            let value = match &field.value {
                Value::String(s) if s.contains("!(") => s.clone(),
                _ => continue,
            };

            let (resolved, unresolved) = self.resolve_str(&value);
            for name in unresolved {
                messaging.emit(Diagnostic::UnresolvedVariable {
                    name,
                    context: context.clone(),
                });
            }

            field.value = Value::String(resolved);
        }
    }

    /// Substitute variables in every string field of an output.
    pub fn resolve_output(&self, output: &mut Output, messaging: &mut Messaging) {
        for table in output.tables_mut() {
            for row in table.rows_mut() {
                self.resolve_row(row, messaging);
            }
        }
    }
}

enum Resolution {
    Value(String),
    Late,
}

/// Locates files referenced by object fields.
#[derive(Clone, Debug, Default)]
pub struct FileResolver {
    bind_paths: Vec<PathBuf>,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory searched for relative paths, after existing ones.
    pub fn add_bind_path(&mut self, path: impl AsRef<Path>) {
        self.bind_paths.push(path.as_ref().to_path_buf());
    }

    pub fn bind_paths(&self) -> &[PathBuf] {
        &self.bind_paths
    }

    /// Find a file, trying the path as given then each bind path in order.
    pub fn resolve(&self, source: &str) -> Option<PathBuf> {
        let normalized = source.replace('\\', "/");
        let path = Path::new(&normalized);

        if path.is_file() {
            return Some(path.to_path_buf());
        }

        if path.is_absolute() {
            return None;
        }

        self.bind_paths
            .iter()
            .map(|p| p.join(path))
            .find(|candidate| candidate.is_file())
    }

    fn resolve_row(&self, row: &mut Row, messaging: &mut Messaging) -> usize {
        let object_columns = row
            .definition()
            .columns
            .iter()
            .map(|c| c.column_type == ColumnType::Object)
            .collect::<Vec<_>>();
        let mut resolved = 0;

        for (i, is_object) in object_columns.into_iter().enumerate() {
            if !is_object {
                continue;
            }

            let source = match row.value(i) {
                Value::String(s) if !s.is_empty() => s.clone(),
                _ => continue,
            };

            match self.resolve(&source) {
                Some(path) => {
                    debug!("resolved {} to {}", source, path.display());
                    let field = row.field_mut(i);
                    field.value = Value::String(path.display().to_string());
                    field
                        .object
                        .get_or_insert_with(ObjectSource::default)
                        .unresolved_data = Some(source);
                    resolved += 1;
                }
                None => {
                    messaging.emit(Diagnostic::FileNotFound {
                        path: source,
                        table: row.table_name().to_string(),
                        key: row.primary_key().unwrap_or_else(|| row.to_key_string()),
                    });
                }
            }
        }

        resolved
    }

    /// Resolve object fields of an output to existing files.
    ///
    /// Missing files are reported per row and left unresolved. Returns the
    /// number of fields resolved.
    pub fn resolve_output(&self, output: &mut Output, messaging: &mut Messaging) -> usize {
        let mut resolved = 0;

        for table in output.tables_mut() {
            for row in table.rows_mut() {
                resolved += self.resolve_row(row, messaging);
            }
        }

        resolved
    }

    /// Resolve object fields of every row carried by a transform.
    pub fn resolve_transform(&self, transform: &mut Transform, messaging: &mut Messaging) -> usize {
        let mut resolved = 0;

        for table in transform.tables_mut() {
            for change in table.rows_mut() {
                for row in change.rows_mut() {
                    resolved += self.resolve_row(row, messaging);
                }
            }
        }

        resolved
    }
}
