//! VOTable parsing
//!
//! Reads a VOTable document into field descriptors, table metadata and a
//! Polars DataFrame. Elements are matched by local name so namespaced
//! documents (`<vot:VOTABLE>`) parse the same as plain ones.
//!
//! Supported serializations: TABLEDATA, and BINARY/BINARY2 with a base64
//! encoded inline STREAM. FITS and external stream references are rejected.

use super::binary::{decode_rows, BinaryFormat};
use super::error::{Result, TapError};
use super::table_convert::rows_to_dataframe;
use super::xml::{attr, text_of};
use base64::Engine;
use polars::prelude::DataFrame;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

/// A row of raw cell text, `None` for empty cells
pub(crate) type RawRow = Vec<Option<String>>;

/// VOTable primitive datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoDatatype {
    Boolean,
    Bit,
    UnsignedByte,
    Short,
    Int,
    Long,
    Char,
    UnicodeChar,
    Float,
    Double,
    FloatComplex,
    DoubleComplex,
}

impl VoDatatype {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "boolean" => Self::Boolean,
            "bit" => Self::Bit,
            "unsignedByte" => Self::UnsignedByte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "char" => Self::Char,
            "unicodeChar" => Self::UnicodeChar,
            "float" => Self::Float,
            "double" => Self::Double,
            "floatComplex" => Self::FloatComplex,
            "doubleComplex" => Self::DoubleComplex,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Bit => "bit",
            Self::UnsignedByte => "unsignedByte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Char => "char",
            Self::UnicodeChar => "unicodeChar",
            Self::Float => "float",
            Self::Double => "double",
            Self::FloatComplex => "floatComplex",
            Self::DoubleComplex => "doubleComplex",
        }
    }

    /// True for `char` and `unicodeChar`
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Char | Self::UnicodeChar)
    }
}

impl std::fmt::Display for VoDatatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column descriptor from a `FIELD` element
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub id: Option<String>,
    pub datatype: VoDatatype,
    pub arraysize: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub utype: Option<String>,
    pub description: Option<String>,
    /// Sentinel from `<VALUES null="...">`
    pub null: Option<String>,
}

impl Field {
    /// A single value per cell (no arraysize, or arraysize 1)
    pub fn is_scalar(&self) -> bool {
        matches!(self.arraysize.as_deref(), None | Some("1"))
    }

    fn from_start(e: &BytesStart) -> Result<Self> {
        let name = attr(e, b"name")?
            .or(attr(e, b"ID")?)
            .ok_or_else(|| TapError::VoTable("FIELD without name or ID".into()))?;
        let raw_type = attr(e, b"datatype")?
            .ok_or_else(|| TapError::VoTable(format!("FIELD '{}' has no datatype", name)))?;
        let datatype = VoDatatype::parse(&raw_type).ok_or_else(|| {
            TapError::VoTable(format!("FIELD '{}' has unknown datatype '{}'", name, raw_type))
        })?;

        Ok(Field {
            name,
            id: attr(e, b"ID")?,
            datatype,
            arraysize: attr(e, b"arraysize")?,
            unit: attr(e, b"unit")?,
            ucd: attr(e, b"ucd")?,
            utype: attr(e, b"utype")?,
            description: None,
            null: None,
        })
    }
}

/// An `INFO` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub value: String,
    pub content: Option<String>,
}

/// A `PARAM` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub datatype: Option<String>,
    pub unit: Option<String>,
}

/// Outcome reported by the service in `<INFO name="QUERY_STATUS">`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Ok,
    /// The result was truncated at MAXREC
    Overflow,
    Error(String),
}

/// Table-level metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMeta {
    pub name: Option<String>,
    pub id: Option<String>,
    pub description: Option<String>,
    /// All INFO elements of the document, in document order
    pub infos: Vec<Info>,
    pub params: Vec<Param>,
    pub query_status: Option<QueryStatus>,
}

impl TableMeta {
    /// Value of the first INFO with the given name
    pub fn info(&self, name: &str) -> Option<&str> {
        self.infos
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.value.as_str())
    }
}

/// A parsed result table
#[derive(Debug, Clone)]
pub struct VoTable {
    pub meta: TableMeta,
    pub fields: Vec<Field>,
    pub data: DataFrame,
}

impl VoTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column descriptors
    pub fn columns(&self) -> &[Field] {
        &self.fields
    }
}

/// Parse a VOTable document
///
/// Picks the first TABLE of the `RESOURCE type="results"`, falling back to
/// the first TABLE in the document. A `QUERY_STATUS` of `ERROR` is returned as
/// [`TapError::Query`].
pub fn parse_votable(xml: &str) -> Result<VoTable> {
    let doc = parse_document(xml)?;
    let query_status = doc.query_status();

    match &query_status {
        Some(QueryStatus::Error(message)) => return Err(TapError::Query(message.clone())),
        Some(QueryStatus::Overflow) => {
            warn!("Result truncated by the service (QUERY_STATUS=OVERFLOW)")
        }
        _ => {}
    }

    let ParsedDocument { infos, tables, .. } = doc;
    let index = tables
        .iter()
        .position(|t| t.in_results)
        .or_else(|| (!tables.is_empty()).then_some(0))
        .ok_or_else(|| TapError::VoTable("document contains no TABLE".into()))?;
    let table = tables.into_iter().nth(index).unwrap_or_default();

    let data = rows_to_dataframe(&table.fields, &table.rows)?;
    debug!(
        table = table.name.as_deref().unwrap_or(""),
        rows = data.height(),
        "Converted VOTable to DataFrame"
    );

    Ok(VoTable {
        meta: TableMeta {
            name: table.name,
            id: table.id,
            description: table.description,
            infos,
            params: table.params,
            query_status,
        },
        fields: table.fields,
        data,
    })
}

/// The `QUERY_STATUS=ERROR` message of a document, if it is a VOTable error
/// document. Malformed input yields `None`.
pub fn query_error_message(xml: &str) -> Option<String> {
    match parse_document(xml).ok()?.query_status()? {
        QueryStatus::Error(message) => Some(message),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct ParsedTable {
    name: Option<String>,
    id: Option<String>,
    description: Option<String>,
    params: Vec<Param>,
    fields: Vec<Field>,
    rows: Vec<RawRow>,
    in_results: bool,
}

#[derive(Debug, Default)]
struct ParsedDocument {
    infos: Vec<Info>,
    /// QUERY_STATUS INFOs, flagged when inside the results RESOURCE
    statuses: Vec<(bool, QueryStatus)>,
    tables: Vec<ParsedTable>,
}

impl ParsedDocument {
    /// Most severe QUERY_STATUS of the results RESOURCE (or of the whole
    /// document when it has none): ERROR over OVERFLOW over OK.
    fn query_status(&self) -> Option<QueryStatus> {
        let in_results = self.statuses.iter().any(|(results, _)| *results);
        self.statuses
            .iter()
            .filter(|(results, _)| *results || !in_results)
            .map(|(_, status)| status)
            .max_by_key(|status| match status {
                QueryStatus::Ok => 0,
                QueryStatus::Overflow => 1,
                QueryStatus::Error(_) => 2,
            })
            .cloned()
    }
}

fn status_of(info: &Info) -> QueryStatus {
    match info.value.to_ascii_uppercase().as_str() {
        "ERROR" => QueryStatus::Error(
            info.content
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "unspecified error".to_string()),
        ),
        "OVERFLOW" => QueryStatus::Overflow,
        _ => QueryStatus::Ok,
    }
}

struct StreamState {
    format: BinaryFormat,
    encoding: Option<String>,
    href: Option<String>,
}

#[derive(Default)]
struct DocumentParser {
    doc: ParsedDocument,
    /// Local names of the open elements
    stack: Vec<String>,
    /// `type` attribute of each open RESOURCE
    resources: Vec<Option<String>>,
    table: Option<ParsedTable>,
    field: Option<Field>,
    info: Option<Info>,
    row: Option<RawRow>,
    stream: Option<StreamState>,
    text: String,
}

fn parse_document(xml: &str) -> Result<ParsedDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = DocumentParser::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => parser.start(&e)?,
            Event::Empty(e) => {
                parser.start(&e)?;
                parser.end()?;
            }
            Event::End(_) => parser.end()?,
            Event::Text(t) => parser.text.push_str(&t.unescape()?),
            Event::CData(c) => parser.text.push_str(&text_of(&c)),
            Event::Eof => break,
            _ => {}
        }
    }

    if !parser.stack.is_empty() {
        return Err(TapError::VoTable(format!(
            "unexpected end of document inside <{}>",
            parser.stack.join("/")
        )));
    }

    Ok(parser.doc)
}

impl DocumentParser {
    fn parent(&self) -> Option<&str> {
        self.stack.iter().rev().nth(1).map(String::as_str)
    }

    fn start(&mut self, e: &BytesStart) -> Result<()> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        self.text.clear();

        match name.as_str() {
            "RESOURCE" => self.resources.push(attr(e, b"type")?),
            "TABLE" => {
                let in_results = self
                    .resources
                    .last()
                    .map(|t| t.as_deref() == Some("results"))
                    .unwrap_or(false);
                self.table = Some(ParsedTable {
                    name: attr(e, b"name")?,
                    id: attr(e, b"ID")?,
                    in_results,
                    ..Default::default()
                });
            }
            "FIELD" if self.table.is_some() => self.field = Some(Field::from_start(e)?),
            "VALUES" => {
                if let Some(field) = self.field.as_mut() {
                    field.null = attr(e, b"null")?;
                }
            }
            "PARAM" => {
                if let Some(table) = self.table.as_mut() {
                    table.params.push(Param {
                        name: attr(e, b"name")?.unwrap_or_default(),
                        value: attr(e, b"value")?.unwrap_or_default(),
                        datatype: attr(e, b"datatype")?,
                        unit: attr(e, b"unit")?,
                    });
                }
            }
            "INFO" => {
                self.info = Some(Info {
                    name: attr(e, b"name")?.unwrap_or_default(),
                    value: attr(e, b"value")?.unwrap_or_default(),
                    content: None,
                })
            }
            "TR" => self.row = Some(Vec::new()),
            "BINARY" | "BINARY2" => {
                let format = if name == "BINARY" {
                    BinaryFormat::Binary
                } else {
                    BinaryFormat::Binary2
                };
                self.stream = Some(StreamState {
                    format,
                    encoding: None,
                    href: None,
                });
            }
            "STREAM" => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.encoding = attr(e, b"encoding")?;
                    stream.href = attr(e, b"href")?;
                }
            }
            "FITS" => {
                return Err(TapError::VoTable(
                    "FITS serialization is not supported".into(),
                ))
            }
            _ => {}
        }

        self.stack.push(name);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let text = std::mem::take(&mut self.text);
        let parent = self.parent().map(str::to_string);
        let name = self
            .stack
            .pop()
            .ok_or_else(|| TapError::VoTable("unbalanced closing tag".into()))?;

        match name.as_str() {
            "RESOURCE" => {
                self.resources.pop();
            }
            "TABLE" => {
                if let Some(table) = self.table.take() {
                    self.doc.tables.push(table);
                }
            }
            "FIELD" => {
                if let (Some(field), Some(table)) = (self.field.take(), self.table.as_mut()) {
                    table.fields.push(field);
                }
            }
            "DESCRIPTION" => {
                let text = Some(text).filter(|t| !t.is_empty());
                match parent.as_deref() {
                    Some("FIELD") => {
                        if let Some(field) = self.field.as_mut() {
                            field.description = text;
                        }
                    }
                    Some("TABLE") => {
                        if let Some(table) = self.table.as_mut() {
                            table.description = text;
                        }
                    }
                    _ => {}
                }
            }
            "INFO" => {
                if let Some(mut info) = self.info.take() {
                    info.content = Some(text).filter(|t| !t.is_empty());
                    if info.name == "QUERY_STATUS" {
                        let in_results = self
                            .resources
                            .iter()
                            .any(|t| t.as_deref() == Some("results"));
                        self.doc.statuses.push((in_results, status_of(&info)));
                    }
                    self.doc.infos.push(info);
                }
            }
            "TD" => {
                if let Some(row) = self.row.as_mut() {
                    row.push(Some(text).filter(|t| !t.is_empty()));
                }
            }
            "TR" => {
                if let (Some(row), Some(table)) = (self.row.take(), self.table.as_mut()) {
                    table.rows.push(row);
                }
            }
            "STREAM" => self.finish_stream(&text)?,
            _ => {}
        }
        Ok(())
    }

    fn finish_stream(&mut self, content: &str) -> Result<()> {
        let (Some(stream), Some(table)) = (self.stream.take(), self.table.as_mut()) else {
            return Ok(());
        };

        if let Some(href) = stream.href {
            return Err(TapError::VoTable(format!(
                "external STREAM references are not supported ({})",
                href
            )));
        }
        match stream.encoding.as_deref() {
            Some("base64") => {}
            other => {
                return Err(TapError::VoTable(format!(
                    "unsupported STREAM encoding '{}'",
                    other.unwrap_or("none")
                )))
            }
        }

        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let rows = decode_rows(stream.format, &table.fields, &bytes)?;
        table.rows.extend(rows);
        Ok(())
    }
}
