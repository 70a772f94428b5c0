// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Relational diff of two outputs.

Tables are matched by name and rows by primary key. Rows of tables without a
primary key are keyed by their full contents, so duplicates collapse into a
single entry and the last one wins.
*/

use {
    crate::{
        messaging::{Diagnostic, Messaging},
        output::{Output, Table},
        row::Row,
        settings::BinderSettings,
        table::{ColumnType, PROPERTY_TABLE, SUMMARY_INFORMATION_TABLE},
        transform::{
            summary, RowChange, TableOperation, TableTransform, Transform, TransformFlags,
        },
    },
    log::{debug, info},
    std::collections::{BTreeMap, BTreeSet},
};

/// Security value recorded in transforms: read-only enforced.
const TRANSFORM_SECURITY: &str = "4";

/// Rows indexed by key, remembering first insertion order.
struct RowIndex<'a> {
    order: Vec<String>,
    rows: BTreeMap<String, &'a Row>,
}

impl<'a> RowIndex<'a> {
    fn get(&self, key: &str) -> Option<&'a Row> {
        self.rows.get(key).copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &'a Row)> + '_ {
        self.order
            .iter()
            .filter_map(move |k| self.rows.get(k).map(|r| (k.as_str(), *r)))
    }
}

/// Values read from the compared outputs that every transform records.
struct ProductIdentity {
    product_code: Option<String>,
    product_version: Option<String>,
    upgrade_code: Option<String>,
    codepage: Option<String>,
    template: Option<String>,
    installer_requirement: Option<i32>,
}

impl ProductIdentity {
    fn from_output(output: &Output) -> Self {
        let property = |name: &str| {
            output
                .find_row(PROPERTY_TABLE, name)
                .map(|r| r.value(1).to_string())
        };
        let summary_value = |id: i32| {
            output
                .find_row(SUMMARY_INFORMATION_TABLE, &id.to_string())
                .map(|r| r.value(1).to_string())
        };

        Self {
            product_code: property("ProductCode"),
            product_version: property("ProductVersion"),
            upgrade_code: property("UpgradeCode"),
            codepage: summary_value(summary::CODEPAGE),
            template: summary_value(summary::TARGET_PLATFORM_AND_LANGUAGE),
            installer_requirement: summary_value(summary::INSTALLER_REQUIREMENT)
                .and_then(|v| v.parse::<i32>().ok()),
        }
    }
}

fn section_pair(target: Option<&str>, updated: Option<&str>) -> Option<String> {
    Some(format!(
        "{}/{}",
        target.unwrap_or_default(),
        updated.unwrap_or_default()
    ))
}

/// Computes transforms between outputs.
pub struct Differ<'a> {
    settings: &'a BinderSettings,
}

impl<'a> Differ<'a> {
    pub fn new(settings: &'a BinderSettings) -> Self {
        Self { settings }
    }

    /// Compute the transform turning `target` into `updated`.
    ///
    /// Problems are reported through `messaging`; the returned transform
    /// omits tables that could not be compared.
    pub fn diff(&self, target: &Output, updated: &Output, messaging: &mut Messaging) -> Transform {
        let mut transform = Transform::new(updated.codepage);

        for target_table in target.tables() {
            if target_table.name() == SUMMARY_INFORMATION_TABLE {
                continue;
            }

            match updated.table(target_table.name()) {
                None => {
                    debug!("table {} dropped", target_table.name());
                    transform.insert_table(TableTransform::new(
                        target_table.definition().clone(),
                        TableOperation::Drop,
                    ));
                }
                Some(updated_table) => {
                    if !target_table
                        .definition()
                        .is_compatible_with(updated_table.definition())
                    {
                        messaging.emit(Diagnostic::DatabaseSchemaMismatch(
                            target_table.name().to_string(),
                        ));
                        continue;
                    }

                    let changes = self.compare_tables(target_table, updated_table, messaging);
                    if !changes.is_empty() {
                        transform.insert_table(changes);
                    }
                }
            }
        }

        for updated_table in updated.tables() {
            if updated_table.name() == SUMMARY_INFORMATION_TABLE
                || target.table(updated_table.name()).is_some()
            {
                continue;
            }

            debug!("table {} added", updated_table.name());
            let mut changes =
                TableTransform::new(updated_table.definition().clone(), TableOperation::Add);
            for row in updated_table.rows() {
                let section = section_pair(None, row.section_id());
                changes.push(RowChange::Added(row.clone().with_section_id(section)));
            }
            transform.insert_table(changes);
        }

        self.add_identity(target, updated, &mut transform, messaging);

        let counts = transform.change_counts();
        info!(
            "diff complete: {} added, {} deleted, {} modified rows",
            counts.added, counts.deleted, counts.modified
        );

        transform
    }

    fn add_identity(
        &self,
        target: &Output,
        updated: &Output,
        transform: &mut Transform,
        messaging: &mut Messaging,
    ) {
        let target_identity = ProductIdentity::from_output(target);
        let updated_identity = ProductIdentity::from_output(updated);

        if target_identity.product_code.as_deref() == Some("*") {
            messaging.emit(Diagnostic::InvalidProductCodeInTransform("target"));
        }
        if updated_identity.product_code.as_deref() == Some("*") {
            messaging.emit(Diagnostic::InvalidProductCodeInTransform("updated"));
        }

        if self.settings.suppress_keeping_special_rows() {
            return;
        }

        let target_codepage = target_identity
            .codepage
            .clone()
            .unwrap_or_else(|| target.codepage.to_string());
        let updated_codepage = updated_identity
            .codepage
            .clone()
            .unwrap_or_else(|| updated.codepage.to_string());

        if target_codepage != updated_codepage
            && !self
                .settings
                .validation_flags()
                .contains(TransformFlags::ERROR_CHANGE_CODEPAGE)
        {
            messaging.emit(Diagnostic::CodepageMismatch {
                target: target_codepage,
                updated: updated_codepage.clone(),
            });
        }

        transform.set_summary_property(summary::CODEPAGE, updated_codepage);
        transform.set_summary_property(
            summary::TARGET_PLATFORM_AND_LANGUAGE,
            target_identity.template.unwrap_or_default(),
        );
        transform.set_summary_property(
            summary::UPDATED_PLATFORM_AND_LANGUAGE,
            updated_identity.template.unwrap_or_default(),
        );
        transform.set_summary_property(
            summary::PRODUCT_CODES,
            format!(
                "{}{};{}{};{}",
                target_identity.product_code.unwrap_or_default(),
                target_identity.product_version.unwrap_or_default(),
                updated_identity.product_code.unwrap_or_default(),
                updated_identity.product_version.unwrap_or_default(),
                target_identity
                    .upgrade_code
                    .or(updated_identity.upgrade_code)
                    .unwrap_or_default(),
            ),
        );
        transform.set_summary_property(
            summary::INSTALLER_REQUIREMENT,
            target_identity
                .installer_requirement
                .unwrap_or(0)
                .max(updated_identity.installer_requirement.unwrap_or(0)),
        );
        transform.set_summary_property(summary::SECURITY, TRANSFORM_SECURITY);
        transform.set_summary_property(
            summary::VALIDATION_FLAGS,
            self.settings.validation_flags().bits(),
        );
    }

    fn compare_tables(&self, target: &Table, updated: &Table, messaging: &mut Messaging) -> TableTransform {
        let mut changes = TableTransform::new(target.definition().clone(), TableOperation::None);

        let target_index = self.index_rows(target, messaging);
        let updated_index = self.index_rows(updated, messaging);

        for (key, target_row) in target_index.iter() {
            match updated_index.get(key) {
                None => {
                    let section = section_pair(target_row.section_id(), None);
                    changes.push(RowChange::Deleted(target_row.clone().with_section_id(section)));
                }
                Some(updated_row) => {
                    if let Some(change) = self.compare_rows(target_row, updated_row) {
                        changes.push(change);
                    }
                }
            }
        }

        for (key, updated_row) in updated_index.iter() {
            if target_index.get(key).is_none() {
                let section = section_pair(None, updated_row.section_id());
                changes.push(RowChange::Added(updated_row.clone().with_section_id(section)));
            }
        }

        changes
    }

    /// Index rows by primary key, or by full contents for keyless tables.
    fn index_rows<'t>(&self, table: &'t Table, messaging: &mut Messaging) -> RowIndex<'t> {
        let mut index = RowIndex {
            order: vec![],
            rows: BTreeMap::new(),
        };

        for row in table.rows() {
            let (key, keyed) = match row.primary_key() {
                Some(key) => (key, true),
                None => (row.to_key_string(), false),
            };

            match index.rows.get(&key) {
                None => {
                    index.order.push(key.clone());
                    index.rows.insert(key, row);
                }
                Some(existing) if keyed => {
                    if table.definition().is_wix_action_table()
                        && existing.is_overridable()
                        && !row.is_overridable()
                    {
                        index.rows.insert(key, row);
                    } else if self.settings.show_pedantic_messages() {
                        messaging.emit(Diagnostic::DuplicatePrimaryKey {
                            table: table.name().to_string(),
                            key,
                            kept: "first",
                        });
                    }
                }
                Some(_) => {
                    if self.settings.show_pedantic_messages() {
                        messaging.emit(Diagnostic::DuplicatePrimaryKey {
                            table: table.name().to_string(),
                            key: key.clone(),
                            kept: "last",
                        });
                    }
                    index.rows.insert(key, row);
                }
            }
        }

        index
    }

    fn compare_rows(&self, target: &Row, updated: &Row) -> Option<RowChange> {
        let mut modified = BTreeSet::new();
        let mut keep = self.settings.preserve_unchanged_rows();

        for (i, column) in updated.definition().columns.iter().enumerate() {
            let target_value = target.value(i);
            let updated_value = updated.value(i);

            match column.column_type {
                ColumnType::Preserved | ColumnType::Object => {
                    keep = true;
                }
                _ if column.is_numeric() => {
                    let changed = match (target_value.as_integer(), updated_value.as_integer()) {
                        (Some(a), Some(b)) => a != b,
                        // Unparsable data is compared as authored.
                        _ => target_value.to_string() != updated_value.to_string(),
                    };
                    if changed {
                        modified.insert(i);
                    }
                }
                _ => {
                    if target_value.to_string() != updated_value.to_string() {
                        modified.insert(i);
                    }
                }
            }
        }

        let section = section_pair(target.section_id(), updated.section_id());
        let row = updated.clone().with_section_id(section.clone());
        let previous = target.clone().with_section_id(section);

        if !modified.is_empty() {
            Some(RowChange::Modified {
                row,
                previous,
                modified,
            })
        } else if keep {
            Some(RowChange::Unchanged { row, previous })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            output::OutputType,
            row::Value,
            table::{
                ColumnDefinition, TableDefinition, TableDefinitionCollection, FILE_TABLE,
                WIX_ACTION_TABLE,
            },
            BinderResult,
        },
        std::sync::Arc,
    };

    fn property(output: &mut Output, name: &str, value: &str) -> BinderResult<()> {
        let def = TableDefinitionCollection::standard().require(PROPERTY_TABLE)?;
        output
            .ensure_table(&def)
            .push_row(Row::from_values(def, vec![name.into(), value.into()])?)
    }

    fn file(output: &mut Output, id: &str, size: i32) -> BinderResult<()> {
        let def = TableDefinitionCollection::standard().require(FILE_TABLE)?;
        let mut row = Row::new(def.clone());
        row.set_value(0, id);
        row.set_value(1, "comp");
        row.set_value(2, format!("{}.txt", id));
        row.set_value(3, size);
        row.set_value(7, 1);
        output.ensure_table(&def).push_row(row)
    }

    fn product(codepage: i32) -> BinderResult<Output> {
        let mut output = Output::new(OutputType::Product);
        output.codepage = codepage;
        property(&mut output, "ProductCode", "{11111111-1111-1111-1111-111111111111}")?;
        property(&mut output, "ProductVersion", "1.0.0")?;
        property(&mut output, "UpgradeCode", "{22222222-2222-2222-2222-222222222222}")?;
        file(&mut output, "a", 10)?;
        file(&mut output, "b", 20)?;

        Ok(output)
    }

    #[test]
    fn identical_outputs_produce_no_changes() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let output = product(1252)?;
        let transform = Differ::new(&settings).diff(&output, &output, &mut messaging);

        assert_eq!(transform.change_counts().added, 0);
        assert_eq!(transform.change_counts().deleted, 0);
        assert_eq!(transform.change_counts().modified, 0);
        assert_eq!(transform.tables().count(), 0);
        assert!(!messaging.encountered_error());

        Ok(())
    }

    #[test]
    fn preserve_unchanged_rows() -> BinderResult<()> {
        let mut settings = BinderSettings::default();
        settings.set_preserve_unchanged_rows(true);
        let mut messaging = Messaging::new();

        let output = product(1252)?;
        let transform = Differ::new(&settings).diff(&output, &output, &mut messaging);

        assert_eq!(transform.change_counts().unchanged, 5);
        assert_eq!(transform.change_counts().modified, 0);

        Ok(())
    }

    #[test]
    fn single_property_change() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let target = product(1252)?;
        let mut updated = product(1252)?;
        property(&mut updated, "Extra", "x")?;
        let table = updated.table_mut(PROPERTY_TABLE).unwrap();
        table.rows_mut()[1].set_value(1, "1.0.1");

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        let props = transform.table(PROPERTY_TABLE).unwrap();

        assert_eq!(props.operation, TableOperation::None);
        assert_eq!(props.rows().len(), 2);

        match &props.rows()[0] {
            RowChange::Modified {
                row,
                previous,
                modified,
            } => {
                assert_eq!(row.primary_key().as_deref(), Some("ProductVersion"));
                assert_eq!(previous.value(1), &Value::from("1.0.0"));
                assert_eq!(modified.iter().copied().collect::<Vec<_>>(), vec![1]);
                assert_eq!(row.section_id(), Some("/"));
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert!(props.rows()[1].is_added());
        assert!(transform.table(FILE_TABLE).is_none());

        assert_eq!(
            transform.summary_property(summary::PRODUCT_CODES),
            Some(
                "{11111111-1111-1111-1111-111111111111}1.0.0;\
                 {11111111-1111-1111-1111-111111111111}1.0.1;\
                 {22222222-2222-2222-2222-222222222222}"
            )
        );
        assert_eq!(transform.summary_property(summary::SECURITY), Some("4"));

        Ok(())
    }

    #[test]
    fn product_version_only_change() -> BinderResult<()> {
        let mut settings = BinderSettings::default();
        let flags = TransformFlags::VALIDATE_PRODUCT
            | TransformFlags::VALIDATE_UPGRADE_CODE
            | TransformFlags::VALIDATE_MINOR_VERSION
            | TransformFlags::VALIDATE_NEW_GREATER_EQUAL_BASE_VERSION;
        settings.set_validation_flags(flags);
        let mut messaging = Messaging::new();

        let mut target = Output::new(OutputType::Product);
        target.codepage = 1252;
        property(&mut target, "ProductCode", "{33333333-3333-3333-3333-333333333333}")?;
        property(&mut target, "ProductVersion", "1.0.0")?;
        let mut updated = Output::new(OutputType::Product);
        updated.codepage = 1252;
        property(&mut updated, "ProductCode", "{33333333-3333-3333-3333-333333333333}")?;
        property(&mut updated, "ProductVersion", "2.0.0")?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        assert!(!messaging.encountered_error());
        assert_eq!(transform.tables().count(), 1);

        let props = transform.table(PROPERTY_TABLE).unwrap();
        assert_eq!(props.operation, TableOperation::None);
        assert_eq!(props.rows().len(), 1);

        let change = &props.rows()[0];
        assert_eq!(change.operation_name(), Some("modify"));
        assert_eq!(change.row().primary_key().as_deref(), Some("ProductVersion"));
        assert_eq!(change.row().value(1), &Value::from("2.0.0"));
        assert_eq!(change.previous().map(|r| r.value(1)), Some(&Value::from("1.0.0")));
        assert_eq!(
            change.modified_fields().map(|m| m.iter().copied().collect::<Vec<_>>()),
            Some(vec![1])
        );
        assert!(props
            .rows()
            .iter()
            .all(|c| c.row().primary_key().as_deref() != Some("ProductCode")));

        assert_eq!(
            transform.summary_property(summary::PRODUCT_CODES),
            Some(
                "{33333333-3333-3333-3333-333333333333}1.0.0;\
                 {33333333-3333-3333-3333-333333333333}2.0.0;"
            )
        );
        assert_eq!(
            transform.summary_property(summary::VALIDATION_FLAGS),
            Some(flags.bits().to_string().as_str())
        );
        assert_eq!(transform.summary_property(summary::CODEPAGE), Some("1252"));
        assert_eq!(transform.summary_property(summary::SECURITY), Some("4"));

        Ok(())
    }

    #[test]
    fn unparsable_numeric_values_compared_as_text() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let target = product(1252)?;
        let mut updated = product(1252)?;
        let mut changed = target.clone();
        {
            let files = changed.table_mut(FILE_TABLE).unwrap();
            files.rows_mut()[0].set_value(6, "abc");
            files.rows_mut()[1].set_value(6, "same");
        }
        {
            let files = updated.table_mut(FILE_TABLE).unwrap();
            files.rows_mut()[0].set_value(6, "def");
            files.rows_mut()[1].set_value(6, "same");
        }

        let transform = Differ::new(&settings).diff(&changed, &updated, &mut messaging);
        let files = transform.table(FILE_TABLE).unwrap();
        assert_eq!(files.rows().len(), 1);
        assert_eq!(files.rows()[0].row().primary_key().as_deref(), Some("a"));
        assert_eq!(
            files.rows()[0].modified_fields().map(|m| m.contains(&6)),
            Some(true)
        );

        // Null against unparsable text is a change too.
        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        let files = transform.table(FILE_TABLE).unwrap();
        assert_eq!(files.rows().len(), 2);
        assert!(files.rows().iter().all(|c| c.is_modified()));

        Ok(())
    }

    #[test]
    fn deleted_and_added_rows_carry_sections() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let mut target = product(1252)?;
        for row in target.table_mut(FILE_TABLE).into_iter().flat_map(|t| t.rows_mut()) {
            row.set_section_id(Some("t".into()));
        }
        let mut updated = product(1252)?;
        let files = updated.table_mut(FILE_TABLE).unwrap();
        files.rows_mut().remove(0);
        files.rows_mut()[0].set_section_id(Some("u".into()));
        files.rows_mut()[0].set_value(3, 25);
        file(&mut updated, "c", 30)?;
        updated.table_mut(FILE_TABLE).unwrap().rows_mut()[1]
            .set_section_id(Some("u".into()));

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        let changes = transform.table(FILE_TABLE).unwrap().rows();

        assert_eq!(changes.len(), 3);
        assert!(changes[0].is_deleted());
        assert_eq!(changes[0].row().section_id(), Some("t/"));
        assert!(changes[1].is_modified());
        assert_eq!(changes[1].row().section_id(), Some("t/u"));
        assert!(changes[2].is_added());
        assert_eq!(changes[2].row().section_id(), Some("/u"));

        Ok(())
    }

    #[test]
    fn added_and_dropped_tables() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let target = product(1252)?;
        let mut updated = product(1252)?;
        updated.remove_table(FILE_TABLE);
        let binary = TableDefinitionCollection::standard().require("Binary")?;
        updated
            .ensure_table(&binary)
            .push_row(Row::from_values(binary, vec!["icon".into(), "icon.ico".into()])?)?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);

        let dropped = transform.table(FILE_TABLE).unwrap();
        assert_eq!(dropped.operation, TableOperation::Drop);
        assert!(dropped.is_empty());

        let added = transform.table("Binary").unwrap();
        assert_eq!(added.operation, TableOperation::Add);
        assert_eq!(added.rows().len(), 1);
        assert!(added.rows()[0].is_added());

        Ok(())
    }

    #[test]
    fn schema_mismatch_skips_table() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let target = product(1252)?;
        let mut updated = product(1252)?;
        let mut def = (**updated.table(FILE_TABLE).unwrap().definition()).clone();
        def.columns.push(ColumnDefinition::number("Extra").nullable());
        let def = Arc::new(def);
        updated.remove_table(FILE_TABLE);
        updated
            .ensure_table(&def)
            .push_row(Row::new(def.clone()))?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);

        assert!(transform.table(FILE_TABLE).is_none());
        assert!(messaging.encountered_error());
        assert_eq!(
            messaging.errors().next(),
            Some(&Diagnostic::DatabaseSchemaMismatch(FILE_TABLE.into()))
        );

        Ok(())
    }

    #[test]
    fn wix_action_override() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();
        let def = TableDefinitionCollection::standard().require(WIX_ACTION_TABLE)?;

        let action = |sequence: i32, overridable: i32| {
            Row::from_values(
                def.clone(),
                vec![
                    "InstallExecuteSequence".into(),
                    "Custom".into(),
                    Value::Null,
                    sequence.into(),
                    Value::Null,
                    Value::Null,
                    overridable.into(),
                ],
            )
        };

        let mut target = Output::new(OutputType::Product);
        target.ensure_table(&def).push_row(action(100, 0)?)?;

        let mut updated = Output::new(OutputType::Product);
        updated.ensure_table(&def).push_row(action(200, 1)?)?;
        updated.ensure_table(&def).push_row(action(300, 0)?)?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        let changes = transform.table(WIX_ACTION_TABLE).unwrap().rows();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].row().value(3), &Value::Integer(300));

        Ok(())
    }

    #[test]
    fn duplicate_keys_first_wins_with_pedantic_warning() -> BinderResult<()> {
        let mut settings = BinderSettings::default();
        settings.set_show_pedantic_messages(true);
        let mut messaging = Messaging::new();

        let mut target = Output::new(OutputType::Product);
        property(&mut target, "B", "kept")?;
        let mut updated = Output::new(OutputType::Product);
        property(&mut updated, "A", "first")?;
        property(&mut updated, "A", "second")?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        let changes = transform.table(PROPERTY_TABLE).unwrap().rows();

        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_deleted());
        assert!(changes[1].is_added());
        assert_eq!(changes[1].row().value(1), &Value::from("first"));
        assert_eq!(messaging.warnings().count(), 1);

        Ok(())
    }

    #[test]
    fn keyless_rows_collapse_last_wins() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();
        let def = Arc::new(TableDefinition::new(
            "Keyless",
            vec![
                ColumnDefinition::string("A", 10),
                ColumnDefinition::string("B", 10).nullable(),
            ],
        ));

        let mut target = Output::new(OutputType::Product);
        target.ensure_table(&def);
        let mut updated = Output::new(OutputType::Product);
        let mut first = Row::from_values(def.clone(), vec!["x".into(), "y".into()])?;
        first.set_section_id(Some("one".into()));
        let mut second = first.clone();
        second.set_section_id(Some("two".into()));
        updated.ensure_table(&def).push_row(first)?;
        updated.ensure_table(&def).push_row(second)?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        let changes = transform.table("Keyless").unwrap().rows();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].row().section_id(), Some("/two"));
        assert_eq!(messaging.messages().len(), 0);

        Ok(())
    }

    #[test]
    fn wildcard_product_code_reported() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let target = product(1252)?;
        let mut updated = product(1252)?;
        updated.table_mut(PROPERTY_TABLE).unwrap().rows_mut()[0].set_value(1, "*");

        Differ::new(&settings).diff(&target, &updated, &mut messaging);

        assert_eq!(
            messaging.errors().next(),
            Some(&Diagnostic::InvalidProductCodeInTransform("updated"))
        );

        Ok(())
    }

    #[test]
    fn codepage_change_requires_flag() -> BinderResult<()> {
        let mut settings = BinderSettings::default();
        let mut messaging = Messaging::new();

        let target = product(1252)?;
        let updated = product(932)?;

        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        assert!(messaging.encountered_error());
        assert_eq!(transform.summary_property(summary::CODEPAGE), Some("932"));
        assert_eq!(transform.codepage, 932);

        settings.set_validation_flags(TransformFlags::ERROR_CHANGE_CODEPAGE);
        let mut messaging = Messaging::new();
        let transform = Differ::new(&settings).diff(&target, &updated, &mut messaging);
        assert!(!messaging.encountered_error());
        assert_eq!(
            transform.summary_property(summary::VALIDATION_FLAGS),
            Some("32")
        );

        Ok(())
    }

    #[test]
    fn summary_synthesis_suppressed() -> BinderResult<()> {
        let mut settings = BinderSettings::default();
        settings.set_suppress_keeping_special_rows(true);
        let mut messaging = Messaging::new();

        let output = product(1252)?;
        let transform = Differ::new(&settings).diff(&output, &product(932)?, &mut messaging);

        assert!(transform.summary_information().is_empty());
        assert!(!messaging.encountered_error());

        Ok(())
    }

    #[test]
    fn object_columns_force_retention() -> BinderResult<()> {
        let settings = BinderSettings::default();
        let mut messaging = Messaging::new();
        let binary = TableDefinitionCollection::standard().require("Binary")?;

        let mut output = Output::new(OutputType::Product);
        output
            .ensure_table(&binary)
            .push_row(Row::from_values(binary, vec!["icon".into(), "icon.ico".into()])?)?;

        let transform = Differ::new(&settings).diff(&output, &output, &mut messaging);
        let counts = transform.change_counts();

        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.added + counts.deleted + counts.modified, 0);

        Ok(())
    }
}
