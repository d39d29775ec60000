//! VOSI tableset parsing
//!
//! The `/tables` endpoint describes the published schemas:
//! `tableset/schema/table/column`. Table order in the document is kept.

use super::error::{Result, TapError};
use super::xml::text_of;
use quick_xml::events::Event;
use quick_xml::Reader;

/// A table published by the service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDesc {
    /// Fully qualified name as used in ADQL (e.g. `ivoa.obscore`)
    pub name: String,
    pub schema: Option<String>,
    pub description: Option<String>,
    pub columns: Vec<ColumnDesc>,
}

/// A column of a published table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub datatype: Option<String>,
}

pub fn parse_tableset(xml: &str) -> Result<Vec<TableDesc>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut tables = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut schema: Option<String> = None;
    let mut table: Option<TableDesc> = None;
    let mut column: Option<ColumnDesc> = None;
    let mut text = String::new();
    let mut seen_root = false;

    loop {
        let (name, closing) = match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                (name, false)
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                // Opened and closed in one step
                open(&name, &mut schema, &mut table, &mut column);
                stack.push(name.clone());
                text.clear();
                (name, true)
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                (name, true)
            }
            Event::Text(t) => {
                text.push_str(&t.unescape()?);
                continue;
            }
            Event::CData(c) => {
                text.push_str(&text_of(&c));
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        seen_root = true;
        if !closing {
            open(&name, &mut schema, &mut table, &mut column);
            stack.push(name);
            text.clear();
            continue;
        }

        stack.pop();
        let parent = stack.last().map(String::as_str);
        let value = std::mem::take(&mut text).trim().to_string();
        let value = Some(value).filter(|v| !v.is_empty());

        match (name.as_str(), parent) {
            ("name", Some("table")) => {
                if let Some(t) = table.as_mut() {
                    t.name = value.unwrap_or_default();
                }
            }
            ("description", Some("table")) => {
                if let Some(t) = table.as_mut() {
                    t.description = value;
                }
            }
            ("name", Some("schema")) => schema = value,
            ("name", Some("column")) => {
                if let Some(c) = column.as_mut() {
                    c.name = value.unwrap_or_default();
                }
            }
            ("description", Some("column")) => {
                if let Some(c) = column.as_mut() {
                    c.description = value;
                }
            }
            ("unit", Some("column")) => {
                if let Some(c) = column.as_mut() {
                    c.unit = value;
                }
            }
            ("ucd", Some("column")) => {
                if let Some(c) = column.as_mut() {
                    c.ucd = value;
                }
            }
            ("dataType", Some("column")) => {
                if let Some(c) = column.as_mut() {
                    c.datatype = value;
                }
            }
            ("column", _) => {
                if let (Some(c), Some(t)) = (column.take(), table.as_mut()) {
                    t.columns.push(c);
                }
            }
            ("table", _) => {
                if let Some(t) = table.take() {
                    if t.name.is_empty() {
                        return Err(TapError::Document("VOSI table without a name".into()));
                    }
                    tables.push(t);
                }
            }
            ("schema", _) => schema = None,
            _ => {}
        }
    }

    if !seen_root {
        return Err(TapError::Document("tableset document has no root element".into()));
    }
    if !stack.is_empty() {
        return Err(TapError::Document(format!(
            "tableset document ends inside <{}>",
            stack.join("/")
        )));
    }

    Ok(tables)
}

fn open(
    name: &str,
    schema: &mut Option<String>,
    table: &mut Option<TableDesc>,
    column: &mut Option<ColumnDesc>,
) {
    match name {
        "table" => {
            *table = Some(TableDesc {
                schema: schema.clone(),
                ..Default::default()
            })
        }
        "column" => *column = Some(ColumnDesc::default()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLESET: &str = r#"<?xml version="1.0"?>
<vosi:tableset xmlns:vosi="http://www.ivoa.net/xml/VOSITables/v1.0"
               xmlns:vs="http://www.ivoa.net/xml/VODataService/v1.1">
  <schema>
    <name>ivoa</name>
    <description>IVOA standard tables</description>
    <table type="table">
      <name>ivoa.obscore</name>
      <description>Observation core</description>
      <column>
        <name>obs_id</name>
        <description>Observation id</description>
        <ucd>meta.id</ucd>
        <dataType xsi:type="vs:VOTableType" arraysize="*">char</dataType>
      </column>
      <column>
        <name>s_ra</name>
        <unit>deg</unit>
        <dataType>double</dataType>
      </column>
    </table>
  </schema>
  <schema>
    <name>tap_schema</name>
    <table><name>tap_schema.tables</name></table>
    <table><name>tap_schema.columns</name><column><name>table_name</name></column></table>
  </schema>
</vosi:tableset>"#;

    #[test]
    fn test_parse_tableset() {
        let tables = parse_tableset(TABLESET).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ivoa.obscore", "tap_schema.tables", "tap_schema.columns"]
        );

        let obscore = &tables[0];
        assert_eq!(obscore.schema.as_deref(), Some("ivoa"));
        assert_eq!(obscore.description.as_deref(), Some("Observation core"));
        assert_eq!(obscore.columns.len(), 2);
        assert_eq!(obscore.columns[0].name, "obs_id");
        assert_eq!(obscore.columns[0].ucd.as_deref(), Some("meta.id"));
        assert_eq!(obscore.columns[0].datatype.as_deref(), Some("char"));
        assert_eq!(obscore.columns[1].unit.as_deref(), Some("deg"));

        assert_eq!(tables[2].schema.as_deref(), Some("tap_schema"));
        assert_eq!(tables[2].columns[0].name, "table_name");
    }

    #[test]
    fn test_empty_tableset() {
        let tables = parse_tableset("<tableset/>").unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_table_without_name() {
        let err = parse_tableset("<tableset><schema><table></table></schema></tableset>");
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_or_truncated_document() {
        for body in ["", "Service temporarily down"] {
            assert!(matches!(parse_tableset(body), Err(TapError::Document(_))));
        }
        let truncated = "<tableset><schema><table><name>ivoa.obscore</name></table>";
        assert!(matches!(parse_tableset(truncated), Err(TapError::Document(_))));
    }
}
