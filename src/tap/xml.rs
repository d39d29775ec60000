//! Small helpers shared by the XML readers

use super::error::Result;
use quick_xml::events::{BytesCData, BytesStart};

/// Unescaped value of the attribute whose local name is `key`
pub(crate) fn attr(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.local_name().as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// CDATA content as text
pub(crate) fn text_of(c: &BytesCData) -> String {
    String::from_utf8_lossy(c).into_owned()
}
