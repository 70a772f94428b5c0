// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Persistence of outputs and transforms as `wixOutput` XML.

A persisted output is a `wixOutput` document optionally preceded by a cabinet
holding the files referenced by object fields. When present, the cabinet
starts with `MSCF` and its total size is the little endian `u32` at offset 8;
the XML begins immediately after it.

Documents carry their own table definitions so they can be read without
knowing the schema in advance.

A field is written as the text of its element. Installer databases do not
distinguish an empty string from a null value, so empty strings are read back
as [Value::Null].
*/

use {
    crate::{
        output::{Output, OutputType, SubStorage},
        row::{Field, ObjectSource, Row, Value},
        table::{
            ColumnDefinition, ColumnType, TableDefinition, TableDefinitionCollection,
            SUMMARY_INFORMATION_TABLE,
        },
        transform::{RowChange, TableOperation, TableTransform, Transform},
        BinderError, BinderResult,
    },
    scroll::Pread,
    std::{
        collections::BTreeSet,
        io::{Read, Write},
        path::Path,
        sync::Arc,
    },
    xml::{
        attribute::OwnedAttribute,
        common::XmlVersion,
        reader::{EventReader, XmlEvent as ReadEvent},
        writer::{EmitterConfig, EventWriter, XmlEvent as WriteEvent},
    },
};

pub const WIXOUT_NAMESPACE: &str = "http://schemas.microsoft.com/wix/2006/outputs";
pub const TABLES_NAMESPACE: &str = "http://schemas.microsoft.com/wix/2006/tables";
pub const WIXOUT_VERSION: &str = "3.0.2002.0";

const CABINET_SIGNATURE: &[u8] = b"MSCF";
const CABINET_SIZE_OFFSET: usize = 8;

/// Separate an embedded cabinet from the XML following it.
pub fn split_embedded_cabinet(data: &[u8]) -> BinderResult<(Option<&[u8]>, &[u8])> {
    if !data.starts_with(CABINET_SIGNATURE) {
        return Ok((None, data));
    }

    let size = data
        .pread_with::<u32>(CABINET_SIZE_OFFSET, scroll::LE)
        .map_err(|e| BinderError::OutputFormat(format!("truncated cabinet header: {}", e)))?
        as usize;

    if size > data.len() {
        return Err(BinderError::OutputFormat(format!(
            "embedded cabinet claims {} bytes; only {} available",
            size,
            data.len()
        )));
    }

    Ok((Some(&data[..size]), &data[size..]))
}

/// A parsed XML element.
#[derive(Debug, Default)]
struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<OwnedAttribute>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local_name == name && a.name.namespace.is_none())
            .map(|a| a.value.as_str())
    }

    fn require_attr(&self, name: &str) -> BinderResult<&str> {
        self.attr(name).ok_or_else(|| {
            BinderError::OutputFormat(format!("{} element lacks {} attribute", self.name, name))
        })
    }

    fn flag(&self, name: &str) -> bool {
        self.attr(name) == Some("yes")
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |e| e.name == name)
    }
}

fn parse_tree(reader: impl Read) -> BinderResult<Element> {
    let mut stack: Vec<Element> = vec![];

    for event in EventReader::new(reader) {
        match event? {
            ReadEvent::StartElement {
                name, attributes, ..
            } => {
                stack.push(Element {
                    name: name.local_name,
                    namespace: name.namespace,
                    attributes,
                    ..Default::default()
                });
            }
            ReadEvent::Characters(s) | ReadEvent::CData(s) | ReadEvent::Whitespace(s) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&s);
                }
            }
            ReadEvent::EndElement { .. } => {
                let element = stack
                    .pop()
                    .ok_or_else(|| BinderError::OutputFormat("unbalanced document".into()))?;

                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            _ => {}
        }
    }

    Err(BinderError::OutputFormat("document has no root element".into()))
}

fn parse_value(column: &ColumnDefinition, text: &str) -> BinderResult<Value> {
    if text.is_empty() {
        Ok(Value::Null)
    } else if column.is_numeric() {
        text.parse::<i32>().map(Value::Integer).map_err(|_| {
            BinderError::OutputFormat(format!(
                "column {} expects an integer, found {}",
                column.name, text
            ))
        })
    } else {
        Ok(Value::from(text))
    }
}

fn parse_definition(element: &Element) -> BinderResult<TableDefinition> {
    let columns = element
        .children_named("columnDefinition")
        .map(|c| {
            let mut column = ColumnDefinition::new(
                c.require_attr("name")?,
                ColumnType::try_from(c.require_attr("type")?)?,
            );
            column.length = c.attr("length").and_then(|v| v.parse().ok()).unwrap_or(0);
            column.primary_key = c.flag("primaryKey");
            column.nullable = c.flag("nullable");
            column.localizable = c.flag("localizable");
            column.min_value = c.attr("minValue").and_then(|v| v.parse().ok());
            column.max_value = c.attr("maxValue").and_then(|v| v.parse().ok());

            Ok(column)
        })
        .collect::<BinderResult<Vec<_>>>()?;

    let mut definition = TableDefinition::new(element.require_attr("name")?, columns);
    definition.unreal = element.flag("unreal");

    Ok(definition)
}

/// Parsed row plus the transform annotations of its fields.
struct ParsedRow {
    row: Row,
    previous: Vec<Option<Value>>,
    modified: BTreeSet<usize>,
}

fn parse_row(definition: &Arc<TableDefinition>, element: &Element) -> BinderResult<ParsedRow> {
    let field_elements = element.children_named("field").collect::<Vec<_>>();
    if field_elements.len() != definition.columns.len() {
        return Err(BinderError::FieldCountMismatch {
            table: definition.name.clone(),
            expected: definition.columns.len(),
            actual: field_elements.len(),
        });
    }

    let mut fields = vec![];
    let mut previous = vec![];
    let mut modified = BTreeSet::new();

    for (i, (column, field)) in definition.columns.iter().zip(field_elements).enumerate() {
        let object = if field.attr("cabinetFileId").is_some()
            || field.attr("baseUri").is_some()
            || field.attr("unresolvedData").is_some()
        {
            Some(ObjectSource {
                cabinet_file_id: field.attr("cabinetFileId").map(|s| s.to_string()),
                base_uri: field.attr("baseUri").map(|s| s.to_string()),
                unresolved_data: field.attr("unresolvedData").map(|s| s.to_string()),
            })
        } else {
            None
        };

        fields.push(Field {
            value: parse_value(column, &field.text)?,
            object,
        });
        previous.push(
            field
                .attr("previousData")
                .map(|v| parse_value(column, v))
                .transpose()?,
        );
        if field.flag("modified") {
            modified.insert(i);
        }
    }

    let mut row = Row::from_fields(definition.clone(), fields)?;
    row.set_section_id(element.attr("sectionId").map(|s| s.to_string()));
    row.set_source_line(element.attr("sourceLineNumber").map(|s| s.to_string()));

    Ok(ParsedRow {
        row,
        previous,
        modified,
    })
}

fn parse_definitions(root: &Element) -> BinderResult<TableDefinitionCollection> {
    let mut definitions = TableDefinitionCollection::new();

    for defs in root.children_named("tableDefinitions") {
        for def in defs.children_named("tableDefinition") {
            definitions.add(parse_definition(def)?);
        }
    }

    Ok(definitions)
}

fn lookup_definition(
    definitions: &TableDefinitionCollection,
    name: &str,
) -> BinderResult<Arc<TableDefinition>> {
    match definitions.get(name) {
        Some(def) => Ok(def.clone()),
        None => TableDefinitionCollection::standard().require(name),
    }
}

fn check_root(root: &Element) -> BinderResult<OutputType> {
    if root.name != "wixOutput" || root.namespace.as_deref() != Some(WIXOUT_NAMESPACE) {
        return Err(BinderError::OutputFormat(format!(
            "expected wixOutput root element; found {}",
            root.name
        )));
    }

    OutputType::try_from(root.require_attr("type")?)
}

fn codepage(root: &Element) -> BinderResult<i32> {
    match root.attr("codepage") {
        Some(v) => v
            .parse::<i32>()
            .map_err(|_| BinderError::OutputFormat(format!("invalid codepage: {}", v))),
        None => Ok(0),
    }
}

fn output_from_element(root: &Element) -> BinderResult<Output> {
    let output_type = check_root(root)?;
    if output_type == OutputType::Transform {
        return Err(BinderError::OutputFormat(
            "document holds a transform, not an output".into(),
        ));
    }

    let definitions = parse_definitions(root)?;
    let mut output = Output::new(output_type);
    output.codepage = codepage(root)?;

    for table_element in root.children_named("table") {
        let definition = lookup_definition(&definitions, table_element.require_attr("name")?)?;
        let table = output.ensure_table(&definition);

        for row_element in table_element.children_named("row") {
            table.push_row(parse_row(&definition, row_element)?.row)?;
        }
    }

    for storage in root.children_named("subStorage") {
        let document = storage.children_named("wixOutput").next().ok_or_else(|| {
            BinderError::OutputFormat("subStorage element holds no document".into())
        })?;

        output.sub_storages.push(SubStorage {
            name: storage.require_attr("name")?.to_string(),
            transform: transform_from_element(document)?,
        });
    }

    Ok(output)
}

fn transform_from_element(root: &Element) -> BinderResult<Transform> {
    if check_root(root)? != OutputType::Transform {
        return Err(BinderError::OutputFormat("document does not hold a transform".into()));
    }

    let definitions = parse_definitions(root)?;
    let mut transform = Transform::new(codepage(root)?);

    for table_element in root.children_named("table") {
        let name = table_element.require_attr("name")?;
        let definition = lookup_definition(&definitions, name)?;

        if name == SUMMARY_INFORMATION_TABLE {
            for row_element in table_element.children_named("row") {
                let parsed = parse_row(&definition, row_element)?;
                let id = parsed.row.value(0).as_integer().ok_or_else(|| {
                    BinderError::OutputFormat("summary information row lacks an id".into())
                })?;
                transform.set_summary_property(id, parsed.row.value(1));
            }
            continue;
        }

        let operation = match table_element.attr("op") {
            None => TableOperation::None,
            Some("add") => TableOperation::Add,
            Some("drop") => TableOperation::Drop,
            Some(op) => {
                return Err(BinderError::OutputFormat(format!(
                    "unknown table operation: {}",
                    op
                )))
            }
        };

        let mut changes = TableTransform::new(definition.clone(), operation);

        for row_element in table_element.children_named("row") {
            let parsed = parse_row(&definition, row_element)?;

            let change = match row_element.attr("op") {
                Some("add") => RowChange::Added(parsed.row),
                Some("delete") => RowChange::Deleted(parsed.row),
                op @ (None | Some("modify")) => {
                    let mut previous = parsed.row.clone();
                    for (i, value) in parsed.previous.into_iter().enumerate() {
                        if let Some(value) = value {
                            previous.set_value(i, value);
                        }
                    }

                    if op.is_some() && !parsed.modified.is_empty() {
                        RowChange::Modified {
                            row: parsed.row,
                            previous,
                            modified: parsed.modified,
                        }
                    } else {
                        RowChange::Unchanged {
                            row: parsed.row,
                            previous,
                        }
                    }
                }
                Some(op) => {
                    return Err(BinderError::OutputFormat(format!(
                        "unknown row operation: {}",
                        op
                    )))
                }
            };

            changes.push(change);
        }

        transform.insert_table(changes);
    }

    Ok(transform)
}

/// Read an output document.
pub fn read_output(reader: impl Read) -> BinderResult<Output> {
    output_from_element(&parse_tree(reader)?)
}

/// Read a transform document.
pub fn read_transform(reader: impl Read) -> BinderResult<Transform> {
    transform_from_element(&parse_tree(reader)?)
}

fn write_definitions<'a, W: Write>(
    writer: &mut EventWriter<W>,
    definitions: impl Iterator<Item = &'a TableDefinition>,
) -> BinderResult<()> {
    writer.write(WriteEvent::start_element("tableDefinitions").default_ns(TABLES_NAMESPACE))?;

    for definition in definitions {
        let mut element = WriteEvent::start_element("tableDefinition").attr("name", &definition.name);
        if definition.unreal {
            element = element.attr("unreal", "yes");
        }
        writer.write(element)?;

        for column in &definition.columns {
            let length = column.length.to_string();
            let min_value = column.min_value.map(|v| v.to_string());
            let max_value = column.max_value.map(|v| v.to_string());

            let mut element = WriteEvent::start_element("columnDefinition")
                .attr("name", &column.name)
                .attr("type", column.column_type.as_str())
                .attr("length", &length);
            if column.primary_key {
                element = element.attr("primaryKey", "yes");
            }
            if column.nullable {
                element = element.attr("nullable", "yes");
            }
            if column.localizable {
                element = element.attr("localizable", "yes");
            }
            if let Some(v) = &min_value {
                element = element.attr("minValue", v);
            }
            if let Some(v) = &max_value {
                element = element.attr("maxValue", v);
            }
            writer.write(element)?;
            writer.write(WriteEvent::end_element())?;
        }

        writer.write(WriteEvent::end_element())?;
    }

    writer.write(WriteEvent::end_element())?;

    Ok(())
}

fn write_row<W: Write>(
    writer: &mut EventWriter<W>,
    row: &Row,
    operation: Option<&str>,
    previous: Option<&Row>,
    modified: Option<&BTreeSet<usize>>,
) -> BinderResult<()> {
    let mut element = WriteEvent::start_element("row");
    if let Some(op) = operation {
        element = element.attr("op", op);
    }
    if let Some(section) = row.section_id() {
        element = element.attr("sectionId", section);
    }
    if let Some(line) = row.source_line() {
        element = element.attr("sourceLineNumber", line);
    }
    writer.write(element)?;

    for (i, field) in row.fields().iter().enumerate() {
        let previous_data = previous
            .map(|p| p.value(i))
            .filter(|v| *v != &field.value)
            .map(|v| v.to_string());

        let mut element = WriteEvent::start_element("field");
        if modified.map(|m| m.contains(&i)).unwrap_or(false) {
            element = element.attr("modified", "yes");
        }
        if let Some(v) = &previous_data {
            element = element.attr("previousData", v);
        }
        if let Some(object) = &field.object {
            if let Some(v) = &object.cabinet_file_id {
                element = element.attr("cabinetFileId", v);
            }
            if let Some(v) = &object.base_uri {
                element = element.attr("baseUri", v);
            }
            if let Some(v) = &object.unresolved_data {
                element = element.attr("unresolvedData", v);
            }
        }
        writer.write(element)?;

        let text = field.value.to_string();
        if !text.is_empty() {
            writer.write(WriteEvent::characters(&text))?;
        }
        writer.write(WriteEvent::end_element())?;
    }

    writer.write(WriteEvent::end_element())?;

    Ok(())
}

fn write_output_element<W: Write>(writer: &mut EventWriter<W>, output: &Output) -> BinderResult<()> {
    let codepage = output.codepage.to_string();
    writer.write(
        WriteEvent::start_element("wixOutput")
            .default_ns(WIXOUT_NAMESPACE)
            .attr("type", output.output_type.as_str())
            .attr("codepage", &codepage)
            .attr("version", WIXOUT_VERSION),
    )?;

    write_definitions(writer, output.tables().map(|t| t.definition().as_ref()))?;

    for table in output.tables() {
        writer.write(WriteEvent::start_element("table").attr("name", table.name()))?;
        for row in table.rows() {
            write_row(writer, row, None, None, None)?;
        }
        writer.write(WriteEvent::end_element())?;
    }

    for storage in &output.sub_storages {
        writer.write(WriteEvent::start_element("subStorage").attr("name", &storage.name))?;
        write_transform_element(writer, &storage.transform)?;
        writer.write(WriteEvent::end_element())?;
    }

    writer.write(WriteEvent::end_element())?;

    Ok(())
}

fn write_transform_element<W: Write>(
    writer: &mut EventWriter<W>,
    transform: &Transform,
) -> BinderResult<()> {
    let codepage = transform.codepage.to_string();
    writer.write(
        WriteEvent::start_element("wixOutput")
            .default_ns(WIXOUT_NAMESPACE)
            .attr("type", OutputType::Transform.as_str())
            .attr("codepage", &codepage)
            .attr("version", WIXOUT_VERSION),
    )?;

    let summary_definition = TableDefinitionCollection::standard().require(SUMMARY_INFORMATION_TABLE)?;
    let has_summary = !transform.summary_information().is_empty();

    write_definitions(
        writer,
        transform
            .tables()
            .map(|t| t.definition().as_ref())
            .chain(has_summary.then(|| summary_definition.as_ref())),
    )?;

    for table in transform.tables() {
        let mut element = WriteEvent::start_element("table").attr("name", table.name());
        if let Some(op) = table.operation.as_str() {
            element = element.attr("op", op);
        }
        writer.write(element)?;

        for change in table.rows() {
            write_row(
                writer,
                change.row(),
                change.operation_name(),
                change.previous(),
                change.modified_fields(),
            )?;
        }

        writer.write(WriteEvent::end_element())?;
    }

    if has_summary {
        writer.write(WriteEvent::start_element("table").attr("name", SUMMARY_INFORMATION_TABLE))?;
        for (id, value) in transform.summary_information() {
            let row = Row::from_values(
                summary_definition.clone(),
                vec![Value::Integer(*id), Value::from(value.as_str())],
            )?;
            write_row(writer, &row, None, None, None)?;
        }
        writer.write(WriteEvent::end_element())?;
    }

    writer.write(WriteEvent::end_element())?;

    Ok(())
}

fn document_writer<W: Write>(writer: W) -> BinderResult<EventWriter<W>> {
    let mut writer = EmitterConfig::new()
        .perform_indent(true)
        .create_writer(writer);

    writer.write(WriteEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("utf-8"),
        standalone: None,
    })?;

    Ok(writer)
}

/// Write an output document.
pub fn write_output(output: &Output, writer: impl Write) -> BinderResult<()> {
    let mut writer = document_writer(writer)?;
    write_output_element(&mut writer, output)
}

/// Write a transform document.
pub fn write_transform(transform: &Transform, writer: impl Write) -> BinderResult<()> {
    let mut writer = document_writer(writer)?;
    write_transform_element(&mut writer, transform)
}

/// Load an output file, returning any embedded cabinet alongside it.
///
/// Object fields stored in the embedded cabinet without a base URI are
/// pointed at `path`.
pub fn load_output(path: impl AsRef<Path>) -> BinderResult<(Output, Option<Vec<u8>>)> {
    let data = std::fs::read(path.as_ref())?;
    let (cabinet, xml) = split_embedded_cabinet(&data)?;
    let mut output = read_output(xml)?;

    if cabinet.is_some() {
        let base_uri = path.as_ref().display().to_string();
        for table in output.tables_mut() {
            for row in table.rows_mut() {
                for field in row.fields_mut() {
                    if let Some(object) = &mut field.object {
                        if object.cabinet_file_id.is_some() && object.base_uri.is_none() {
                            object.base_uri = Some(base_uri.clone());
                        }
                    }
                }
            }
        }
    }

    Ok((output, cabinet.map(|c| c.to_vec())))
}

/// Save an output file, optionally prefixed by an embedded cabinet.
pub fn save_output(
    output: &Output,
    path: impl AsRef<Path>,
    cabinet: Option<&[u8]>,
) -> BinderResult<()> {
    let mut data = vec![];

    if let Some(cabinet) = cabinet {
        let (embedded, rest) = split_embedded_cabinet(cabinet)?;
        if embedded.is_none() || !rest.is_empty() {
            return Err(BinderError::OutputFormat(
                "embedded data is not a single cabinet".into(),
            ));
        }
        data.extend_from_slice(cabinet);
    }

    write_output(output, &mut data)?;
    std::fs::write(path.as_ref(), data)?;

    Ok(())
}
