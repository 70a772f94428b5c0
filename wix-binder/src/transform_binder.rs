// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Turning transforms into transform files.

A transform file is produced by an installer database engine from two real
databases. [TransformBinder::split] builds the two outputs such that the
engine's own diff reproduces the in-memory transform: rows that only matter
because they changed get a synthetic target row whose changed fields hold
sentinel values guaranteed to differ from the updated data.

Object fields are compared by content. Data stored in the cabinet embedded in
a `wixOutput` file is extracted once per file into the temporary collection.
*/

use {
    crate::{
        messaging::{Diagnostic, Messaging},
        output::{Output, OutputType},
        row::{ObjectSource, Row, Value},
        settings::BinderSettings,
        table::{
            ColumnDefinition, ColumnType, TableDefinition, FILE_TABLE, PROPERTY_TABLE,
            SUMMARY_INFORMATION_TABLE,
        },
        temp_files::TempFileCollection,
        transform::{RowChange, TableOperation, Transform, TransformFlags},
        wixout::split_embedded_cabinet,
        BinderError, BinderResult,
    },
    log::{debug, info},
    std::{
        cell::RefCell,
        collections::{BTreeMap, BTreeSet},
        fs::File,
        io::{BufReader, ErrorKind, Read},
        path::{Path, PathBuf},
    },
    wix_burn::{cabinet::resolve_relative, CabinetService, MsCabinet},
};

/// Properties kept in both databases of every transform.
const IDENTITY_PROPERTIES: [&str; 4] = [
    "ProductCode",
    "ProductLanguage",
    "ProductVersion",
    "UpgradeCode",
];

/// Compares the content of two files.
pub trait FileComparer {
    fn files_equal(&self, a: &Path, b: &Path) -> std::io::Result<bool>;
}

/// [FileComparer] comparing sizes then bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteComparer {}

impl FileComparer for ByteComparer {
    fn files_equal(&self, a: &Path, b: &Path) -> std::io::Result<bool> {
        if std::fs::metadata(a)?.len() != std::fs::metadata(b)?.len() {
            return Ok(false);
        }

        let mut a = BufReader::new(File::open(a)?);
        let mut b = BufReader::new(File::open(b)?);
        let mut buf_a = vec![0u8; 32768];
        let mut buf_b = vec![0u8; 32768];

        loop {
            let count = a.read(&mut buf_a)?;
            if count == 0 {
                return Ok(true);
            }

            b.read_exact(&mut buf_b[0..count])?;
            if buf_a[0..count] != buf_b[0..count] {
                return Ok(false);
            }
        }
    }
}

/// Installer database engine used to materialize outputs.
pub trait DatabaseEngine {
    /// Write `output` as a database at `path`.
    fn create_database(&self, output: &Output, path: &Path) -> BinderResult<()>;

    /// Generate a transform from `target_database` to `updated_database`.
    fn generate_transform(
        &self,
        target_database: &Path,
        updated_database: &Path,
        transform_path: &Path,
        summary_information: &BTreeMap<i32, String>,
        flags: TransformFlags,
    ) -> BinderResult<()>;
}

/// The two databases a transform is generated from.
#[derive(Clone, Debug)]
pub struct TransformDatabases {
    pub target: Output,
    pub updated: Output,
}

/// Value guaranteed to differ from `value` in a column.
fn sentinel(column: &ColumnDefinition, value: &Value, placeholder: &str) -> Value {
    match column.column_type {
        ColumnType::Object => Value::from(placeholder),
        _ if column.is_numeric() => {
            if value.as_integer() == Some(1) {
                Value::Integer(2)
            } else {
                Value::Integer(1)
            }
        }
        _ => {
            if value.to_string() == "0" {
                Value::from("1")
            } else {
                Value::from("0")
            }
        }
    }
}

/// Value for a non-key column of a row synthesized for deletion.
fn deletion_filler(column: &ColumnDefinition, placeholder: &str) -> Value {
    match column.column_type {
        ColumnType::Object => Value::from(placeholder),
        _ if column.is_numeric() => Value::Integer(column.min_value.unwrap_or(0)),
        _ => Value::from("0"),
    }
}

fn is_identity_property(row: &Row) -> bool {
    row.table_name() == PROPERTY_TABLE
        && row
            .value(0)
            .as_str()
            .map(|name| IDENTITY_PROPERTIES.contains(&name))
            .unwrap_or(false)
}

/// Fill in the sequence of a `File` row.
///
/// Added files must already be sequenced.
fn ensure_file_sequence(row: &mut Row, added: bool, messaging: &mut Messaging) -> BinderResult<()> {
    if row.table_name() != FILE_TABLE {
        return Ok(());
    }

    let index = match row.definition().column_index("Sequence") {
        Some(index) => index,
        None => return Ok(()),
    };

    if row.value(index).is_null() {
        let file = row.primary_key().unwrap_or_default();
        if added {
            return Err(BinderError::MissingFileSequence(file));
        }

        messaging.emit(Diagnostic::DefaultedFileSequence(file));
        row.set_value(index, 1);
    }

    Ok(())
}

/// Materializes transforms into transform files.
pub struct TransformBinder<'a> {
    settings: &'a BinderSettings,
    temp_files: &'a TempFileCollection,
    comparer: Box<dyn FileComparer + 'a>,
    cabinets: Box<dyn CabinetService + 'a>,
    /// Extraction directories keyed by the file holding the cabinet.
    extracted: RefCell<BTreeMap<String, PathBuf>>,
}

impl<'a> TransformBinder<'a> {
    pub fn new(settings: &'a BinderSettings, temp_files: &'a TempFileCollection) -> Self {
        Self {
            settings,
            temp_files,
            comparer: Box::new(ByteComparer::default()),
            cabinets: Box::new(MsCabinet::default()),
            extracted: RefCell::new(BTreeMap::new()),
        }
    }

    /// Replace the comparer used for object fields.
    pub fn set_file_comparer(&mut self, comparer: Box<dyn FileComparer + 'a>) {
        self.comparer = comparer;
    }

    /// Replace the service extracting embedded object data.
    pub fn set_cabinet_service(&mut self, service: Box<dyn CabinetService + 'a>) {
        self.cabinets = service;
    }

    /// Extract the cabinet embedded in the `wixOutput` file at `base_uri`.
    fn extract_embedded(&self, base_uri: &str) -> BinderResult<PathBuf> {
        if let Some(dir) = self.extracted.borrow().get(base_uri) {
            return Ok(dir.clone());
        }

        let data = std::fs::read(base_uri)?;
        let cabinet = match split_embedded_cabinet(&data)? {
            (Some(cabinet), _) => cabinet,
            (None, _) => {
                return Err(BinderError::OutputFormat(format!(
                    "{} has no embedded cabinet",
                    base_uri
                )))
            }
        };

        let cabinet_path = self.temp_files.add_extension("cab");
        std::fs::write(&cabinet_path, cabinet)?;
        let dir = self.temp_files.add_directory("embedded")?;
        let names = self.cabinets.extract_cabinet(&cabinet_path, &dir)?;
        debug!("extracted {} objects from {}", names.len(), base_uri);

        self.extracted
            .borrow_mut()
            .insert(base_uri.to_string(), dir.clone());

        Ok(dir)
    }

    /// File holding the data of an object field, if it has any.
    fn object_path(&self, row: &Row, index: usize) -> BinderResult<Option<PathBuf>> {
        let field = row.field(index);
        if field.value.is_null() {
            return Ok(None);
        }

        match &field.object {
            Some(ObjectSource {
                cabinet_file_id: Some(id),
                base_uri: Some(base_uri),
                ..
            }) => Ok(Some(resolve_relative(&self.extract_embedded(base_uri)?, id)?)),
            _ => Ok(Some(PathBuf::from(field.value.to_string()))),
        }
    }

    fn placeholder(&self) -> BinderResult<String> {
        Ok(self.temp_files.empty_file()?.display().to_string())
    }

    /// Whether the data of an object field changed between rows.
    fn object_changed(
        &self,
        row: &Row,
        previous: &Row,
        index: usize,
        messaging: &mut Messaging,
    ) -> BinderResult<bool> {
        let current = match self.object_path(row, index)? {
            Some(path) => path,
            None => return Ok(false),
        };
        let prior = match self.object_path(previous, index)? {
            Some(path) => path,
            None => return Ok(true),
        };

        match self.comparer.files_equal(&prior, &current) {
            Ok(equal) => Ok(!equal),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    let missing = if prior.exists() { &current } else { &prior };
                    messaging.emit(Diagnostic::FileNotFound {
                        path: missing.display().to_string(),
                        table: row.table_name().to_string(),
                        key: row.primary_key().unwrap_or_else(|| row.to_key_string()),
                    });
                } else {
                    debug!(
                        "unable to compare {} with {}: {}",
                        prior.display(),
                        current.display(),
                        e
                    );
                }
                Ok(true)
            }
        }
    }

    /// Build the target row for a matched change.
    ///
    /// Returns the row and the indices of fields that force it into the
    /// transform.
    fn synthesize_target_row(
        &self,
        row: &Row,
        previous: &Row,
        modified: &BTreeSet<usize>,
        messaging: &mut Messaging,
    ) -> BinderResult<(Row, BTreeSet<usize>)> {
        let definition = row.definition().clone();
        let mut target = Row::new(definition.clone());
        target.set_section_id(previous.section_id().map(|s| s.to_string()));
        target.set_source_line(previous.source_line().map(|s| s.to_string()));

        let mut changed = modified.clone();

        for (i, column) in definition.columns.iter().enumerate() {
            if column.column_type == ColumnType::Object && !modified.contains(&i) {
                if self.object_changed(row, previous, i, messaging)? {
                    changed.insert(i);
                } else {
                    target.set_value(i, row.value(i).clone());
                    continue;
                }
            }

            if changed.contains(&i) {
                target.set_value(i, sentinel(column, row.value(i), &self.placeholder()?));
            } else {
                target.set_value(i, row.value(i).clone());
            }
        }

        Ok((target, changed))
    }

    fn synthesize_deleted_row(&self, row: &Row) -> BinderResult<Row> {
        let definition: &TableDefinition = row.definition();
        let mut target = Row::new(row.definition().clone());
        target.set_section_id(row.section_id().map(|s| s.to_string()));
        target.set_source_line(row.source_line().map(|s| s.to_string()));

        for (i, column) in definition.columns.iter().enumerate() {
            if column.primary_key {
                target.set_value(i, row.value(i).clone());
            } else {
                target.set_value(i, deletion_filler(column, &self.placeholder()?));
            }
        }

        Ok(target)
    }

    /// Build the target and updated outputs for a transform.
    pub fn split(&self, transform: &Transform, messaging: &mut Messaging) -> BinderResult<TransformDatabases> {
        let mut target = Output::new(OutputType::Product);
        target.codepage = transform.codepage;
        let mut updated = Output::new(OutputType::Product);
        updated.codepage = transform.codepage;

        for table in transform.tables() {
            if table.name() == SUMMARY_INFORMATION_TABLE {
                continue;
            }

            let definition = table.definition();
            match table.operation {
                TableOperation::Add => {
                    updated.ensure_table(definition);
                }
                TableOperation::Drop => {
                    target.ensure_table(definition);
                }
                TableOperation::None => {
                    target.ensure_table(definition);
                    updated.ensure_table(definition);
                }
            }

            for change in table.rows() {
                match change {
                    RowChange::Added(row) => {
                        let mut row = row.clone();
                        ensure_file_sequence(&mut row, true, messaging)?;
                        updated.ensure_table(definition).push_row(row)?;
                    }
                    RowChange::Deleted(row) => {
                        let mut row = self.synthesize_deleted_row(row)?;
                        ensure_file_sequence(&mut row, false, messaging)?;
                        target.ensure_table(definition).push_row(row)?;
                    }
                    RowChange::Modified {
                        row,
                        previous,
                        modified,
                    } => {
                        self.split_matched(row, previous, modified, &mut target, &mut updated, messaging)?;
                    }
                    RowChange::Unchanged { row, previous } => {
                        self.split_matched(
                            row,
                            previous,
                            &BTreeSet::new(),
                            &mut target,
                            &mut updated,
                            messaging,
                        )?;
                    }
                }
            }
        }

        Ok(TransformDatabases { target, updated })
    }

    fn split_matched(
        &self,
        row: &Row,
        previous: &Row,
        modified: &BTreeSet<usize>,
        target: &mut Output,
        updated: &mut Output,
        messaging: &mut Messaging,
    ) -> BinderResult<()> {
        let (mut target_row, changed) = self.synthesize_target_row(row, previous, modified, messaging)?;

        if changed.is_empty() && !is_identity_property(row) {
            return Ok(());
        }

        let mut updated_row = row.clone();
        ensure_file_sequence(&mut target_row, false, messaging)?;
        ensure_file_sequence(&mut updated_row, false, messaging)?;

        target.ensure_table(row.definition()).push_row(target_row)?;
        updated.ensure_table(row.definition()).push_row(updated_row)?;

        Ok(())
    }

    /// Generate the transform file at `transform_path`.
    ///
    /// Engine failures are reported as diagnostics and surface as
    /// [BinderError::EncounteredErrors].
    pub fn bind(
        &self,
        transform: &Transform,
        transform_path: &Path,
        engine: &dyn DatabaseEngine,
        messaging: &mut Messaging,
    ) -> BinderResult<()> {
        let databases = self.split(transform, messaging)?;

        if messaging.encountered_error() {
            return Err(BinderError::EncounteredErrors);
        }

        let target_path = self.temp_files.add_extension("target.msi");
        let updated_path = self.temp_files.add_extension("updated.msi");

        let res = engine
            .create_database(&databases.target, &target_path)
            .and_then(|_| engine.create_database(&databases.updated, &updated_path))
            .and_then(|_| {
                engine.generate_transform(
                    &target_path,
                    &updated_path,
                    transform_path,
                    transform.summary_information(),
                    self.settings.validation_flags(),
                )
            });

        if let Err(e) = res {
            messaging.emit(Diagnostic::TransformGenerationFailed {
                path: transform_path.display().to_string(),
                message: e.to_string(),
            });
            return Err(BinderError::EncounteredErrors);
        }

        info!("generated transform {}", transform_path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{differ::Differ, table::TableDefinitionCollection, wixout},
        wix_burn::testutil,
    };

    fn file_row(defs: &TableDefinitionCollection, id: &str, size: i32, sequence: Option<i32>) -> BinderResult<Row> {
        Row::from_values(
            defs.require(FILE_TABLE)?,
            vec![
                id.into(),
                "comp".into(),
                format!("{}.txt", id).into(),
                size.into(),
                Value::Null,
                Value::Null,
                Value::Null,
                sequence.into(),
            ],
        )
    }

    fn property_row(defs: &TableDefinitionCollection, name: &str, value: &str) -> BinderResult<Row> {
        Row::from_values(defs.require(PROPERTY_TABLE)?, vec![name.into(), value.into()])
    }

    #[test]
    fn sentinel_values_differ() {
        let number = ColumnDefinition::number("N");
        assert_eq!(sentinel(&number, &Value::Integer(1), "p"), Value::Integer(2));
        assert_eq!(sentinel(&number, &Value::Integer(7), "p"), Value::Integer(1));
        assert_eq!(sentinel(&number, &Value::Null, "p"), Value::Integer(1));

        let string = ColumnDefinition::string("S", 10);
        assert_eq!(sentinel(&string, &Value::from("0"), "p"), Value::from("1"));
        assert_eq!(sentinel(&string, &Value::from("x"), "p"), Value::from("0"));
        assert_eq!(sentinel(&string, &Value::Null, "p"), Value::from("0"));

        let localized_number = ColumnDefinition::number("L").localizable();
        assert_eq!(
            sentinel(&localized_number, &Value::from("0"), "p"),
            Value::from("1")
        );

        let object = ColumnDefinition::new("O", ColumnType::Object);
        assert_eq!(sentinel(&object, &Value::from("a.bin"), "p"), Value::from("p"));
    }

    #[test]
    fn split_modified_row_uses_sentinels() -> BinderResult<()> {
        let defs = TableDefinitionCollection::standard();
        let settings = BinderSettings::default();
        let temp = TempFileCollection::new()?;
        let mut messaging = Messaging::new();

        let previous = file_row(&defs, "f", 10, Some(1))?;
        let row = file_row(&defs, "f", 1, Some(1))?;
        let mut transform = Transform::new(1252);
        transform.ensure_table(&defs.require(FILE_TABLE)?).push(RowChange::Modified {
            row,
            previous,
            modified: [3].into_iter().collect(),
        });

        let dbs = TransformBinder::new(&settings, &temp).split(&transform, &mut messaging)?;

        let target = dbs.target.find_row(FILE_TABLE, "f").unwrap();
        let updated = dbs.updated.find_row(FILE_TABLE, "f").unwrap();
        assert_eq!(updated.value(3), &Value::Integer(1));
        assert_eq!(target.value(3), &Value::Integer(2));
        assert_eq!(target.value(2), &Value::from("f.txt"));
        assert_ne!(target.value(3), updated.value(3));

        Ok(())
    }

    #[test]
    fn split_buckets_rows_and_tables() -> BinderResult<()> {
        let defs = TableDefinitionCollection::standard();
        let settings = BinderSettings::default();
        let temp = TempFileCollection::new()?;
        let mut messaging = Messaging::new();

        let mut transform = Transform::new(1252);
        let files = transform.ensure_table(&defs.require(FILE_TABLE)?);
        files.push(RowChange::Added(file_row(&defs, "new", 5, Some(2))?));
        files.push(RowChange::Deleted(file_row(&defs, "old", 5, Some(3))?));

        let binary = defs.require("Binary")?;
        transform.insert_table(crate::transform::TableTransform::new(
            binary,
            TableOperation::Drop,
        ));

        let props = transform.ensure_table(&defs.require(PROPERTY_TABLE)?);
        let code = property_row(&defs, "ProductCode", "{A}")?;
        props.push(RowChange::Unchanged {
            row: code.clone(),
            previous: code,
        });
        let other = property_row(&defs, "Other", "x")?;
        props.push(RowChange::Unchanged {
            row: other.clone(),
            previous: other,
        });

        let dbs = TransformBinder::new(&settings, &temp).split(&transform, &mut messaging)?;

        assert!(dbs.updated.find_row(FILE_TABLE, "new").is_some());
        assert!(dbs.target.find_row(FILE_TABLE, "new").is_none());

        let old = dbs.target.find_row(FILE_TABLE, "old").unwrap();
        assert!(dbs.updated.find_row(FILE_TABLE, "old").is_none());
        assert_eq!(old.value(1), &Value::from("0"));
        assert_eq!(old.value(3), &Value::Integer(0));
        assert_eq!(old.value(7), &Value::Integer(1));

        assert!(dbs.target.table("Binary").is_some());
        assert!(dbs.updated.table("Binary").is_none());

        assert!(dbs.target.find_row(PROPERTY_TABLE, "ProductCode").is_some());
        assert!(dbs.updated.find_row(PROPERTY_TABLE, "ProductCode").is_some());
        assert!(dbs.target.find_row(PROPERTY_TABLE, "Other").is_none());

        Ok(())
    }

    #[test]
    fn file_sequences() -> BinderResult<()> {
        let defs = TableDefinitionCollection::standard();
        let settings = BinderSettings::default();
        let temp = TempFileCollection::new()?;

        let mut transform = Transform::new(1252);
        transform
            .ensure_table(&defs.require(FILE_TABLE)?)
            .push(RowChange::Added(file_row(&defs, "f", 5, None)?));

        let mut messaging = Messaging::new();
        let res = TransformBinder::new(&settings, &temp).split(&transform, &mut messaging);
        assert!(matches!(res, Err(BinderError::MissingFileSequence(f)) if f == "f"));

        let mut transform = Transform::new(1252);
        transform.ensure_table(&defs.require(FILE_TABLE)?).push(RowChange::Modified {
            row: file_row(&defs, "g", 6, None)?,
            previous: file_row(&defs, "g", 5, None)?,
            modified: [3].into_iter().collect(),
        });

        let dbs = TransformBinder::new(&settings, &temp).split(&transform, &mut messaging)?;
        assert_eq!(
            dbs.updated.find_row(FILE_TABLE, "g").map(|r| r.value(7)),
            Some(&Value::Integer(1))
        );

        Ok(())
    }

    #[test]
    fn object_fields_compared_by_content() -> BinderResult<()> {
        let defs = TableDefinitionCollection::standard();
        let settings = BinderSettings::default();
        let temp = TempFileCollection::new()?;
        let mut messaging = Messaging::new();

        let td = tempfile::Builder::new().prefix("wix-binder-test").tempdir()?;
        let same_a = td.path().join("same_a.bin");
        let same_b = td.path().join("same_b.bin");
        let changed = td.path().join("changed.bin");
        std::fs::write(&same_a, b"identical")?;
        std::fs::write(&same_b, b"identical")?;
        std::fs::write(&changed, b"different")?;

        let binary = defs.require("Binary")?;
        let row = |name: &str, path: &Path| {
            Row::from_values(binary.clone(), vec![name.into(), path.display().to_string().into()])
        };

        let mut transform = Transform::new(1252);
        let table = transform.ensure_table(&binary);
        table.push(RowChange::Unchanged {
            row: row("same", &same_b)?,
            previous: row("same", &same_a)?,
        });
        table.push(RowChange::Unchanged {
            row: row("changed", &changed)?,
            previous: row("changed", &same_a)?,
        });

        let dbs = TransformBinder::new(&settings, &temp).split(&transform, &mut messaging)?;

        assert!(dbs.target.find_row("Binary", "same").is_none());
        let target = dbs.target.find_row("Binary", "changed").unwrap();
        assert_eq!(
            target.value(1),
            &Value::from(temp.empty_file()?.display().to_string())
        );
        assert_eq!(
            dbs.updated.find_row("Binary", "changed").map(|r| r.value(1)),
            Some(&Value::from(changed.display().to_string()))
        );

        Ok(())
    }

    #[test]
    fn embedded_objects_compared_by_content() -> BinderResult<()> {
        let defs = TableDefinitionCollection::standard();
        let settings = BinderSettings::default();
        let temp = TempFileCollection::new()?;
        let mut messaging = Messaging::new();

        let td = tempfile::Builder::new().prefix("wix-binder-test").tempdir()?;
        let binary = defs.require("Binary")?;

        // Every output references its data through the same unresolved path.
        let load = |name: &str, content: &[u8]| -> BinderResult<Row> {
            let cabinet = td.path().join(format!("{}.cab", name));
            testutil::write_cabinet(&cabinet, &[("icon", content)])?;

            let mut row = Row::from_values(binary.clone(), vec!["icon".into(), "Binary/icon.ico".into()])?;
            row.field_mut(1).object = Some(ObjectSource {
                cabinet_file_id: Some("icon".into()),
                base_uri: None,
                unresolved_data: None,
            });
            let mut output = Output::new(OutputType::Product);
            output.ensure_table(&binary).push_row(row)?;

            let path = td.path().join(format!("{}.wixout", name));
            wixout::save_output(&output, &path, Some(&std::fs::read(&cabinet)?))?;

            let (output, _) = wixout::load_output(&path)?;
            Ok(output.find_row("Binary", "icon").unwrap().clone())
        };

        let target = load("target", b"first icon")?;
        let same = load("same", b"first icon")?;
        let changed = load("changed", b"second icon")?;

        let split = |row: Row, messaging: &mut Messaging| -> BinderResult<TransformDatabases> {
            let mut transform = Transform::new(1252);
            transform.ensure_table(&binary).push(RowChange::Unchanged {
                row,
                previous: target.clone(),
            });
            TransformBinder::new(&settings, &temp).split(&transform, messaging)
        };

        let dbs = split(same, &mut messaging)?;
        assert!(dbs.target.find_row("Binary", "icon").is_none());

        let dbs = split(changed, &mut messaging)?;
        assert_eq!(
            dbs.target.find_row("Binary", "icon").map(|r| r.value(1)),
            Some(&Value::from(temp.empty_file()?.display().to_string()))
        );
        assert!(dbs.updated.find_row("Binary", "icon").is_some());
        assert!(!messaging.encountered_error());

        Ok(())
    }

    #[derive(Default)]
    struct RecordingEngine {
        fail: bool,
        created: RefCell<Vec<(PathBuf, usize)>>,
        generated: RefCell<Vec<(PathBuf, BTreeMap<i32, String>)>>,
    }

    impl DatabaseEngine for RecordingEngine {
        fn create_database(&self, output: &Output, path: &Path) -> BinderResult<()> {
            let rows = output.tables().map(|t| t.rows().len()).sum();
            self.created.borrow_mut().push((path.to_path_buf(), rows));

            Ok(())
        }

        fn generate_transform(
            &self,
            _target_database: &Path,
            _updated_database: &Path,
            transform_path: &Path,
            summary_information: &BTreeMap<i32, String>,
            _flags: TransformFlags,
        ) -> BinderResult<()> {
            if self.fail {
                return Err(BinderError::DatabaseEngine("view failure".into()));
            }

            self.generated
                .borrow_mut()
                .push((transform_path.to_path_buf(), summary_information.clone()));

            Ok(())
        }
    }

    #[test]
    fn bind_drives_engine() -> BinderResult<()> {
        let defs = TableDefinitionCollection::standard();
        let settings = BinderSettings::default();
        let temp = TempFileCollection::new()?;

        let mut target = Output::new(OutputType::Product);
        target.codepage = 1252;
        let property = defs.require(PROPERTY_TABLE)?;
        target
            .ensure_table(&property)
            .push_row(property_row(&defs, "ProductVersion", "1.0")?)?;
        let mut updated = target.clone();
        updated.table_mut(PROPERTY_TABLE).unwrap().rows_mut()[0].set_value(1, "1.1");

        let mut messaging = Messaging::new();
        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);

        let engine = RecordingEngine::default();
        let path = temp.path().join("out.mst");
        TransformBinder::new(&settings, &temp).bind(&transform, &path, &engine, &mut messaging)?;

        assert_eq!(engine.created.borrow().len(), 2);
        assert!(engine.created.borrow().iter().all(|(_, rows)| *rows == 1));
        let generated = engine.generated.borrow();
        assert_eq!(generated[0].0, path);
        assert_eq!(generated[0].1.get(&19).map(|s| s.as_str()), Some("4"));

        let failing = RecordingEngine {
            fail: true,
            ..Default::default()
        };
        let res = TransformBinder::new(&settings, &temp).bind(&transform, &path, &failing, &mut messaging);
        assert!(matches!(res, Err(BinderError::EncounteredErrors)));
        assert!(matches!(
            messaging.errors().next(),
            Some(Diagnostic::TransformGenerationFailed { .. })
        ));

        Ok(())
    }
}
