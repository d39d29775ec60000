//! DALI examples document parsing
//!
//! Services publish example queries as an XHTML document at `/examples`,
//! with each query in an element carrying `property="query"`.

use super::error::{Result, TapError};
use super::xml::{attr, text_of};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Text of every `property="query"` element, in document order
///
/// Nested markup inside a query element contributes its text. Elements whose
/// text is empty are skipped.
pub fn parse_examples(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);

    let mut found: Vec<String> = Vec::new();
    // Per open element: index into `found` when it is a query element
    let mut open: Vec<Option<usize>> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                seen_root = true;
                let slot = if attr(&e, b"property")?.as_deref() == Some("query") {
                    found.push(String::new());
                    Some(found.len() - 1)
                } else {
                    None
                };
                open.push(slot);
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(t) => append(&mut found, &open, &t.unescape()?),
            Event::Empty(_) => seen_root = true,
            Event::CData(c) => append(&mut found, &open, &text_of(&c)),
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(TapError::Document("examples document has no root element".into()));
    }
    if !open.is_empty() {
        return Err(TapError::Document(format!(
            "examples document ends with {} unclosed element(s)",
            open.len()
        )));
    }

    Ok(found
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect())
}

fn append(found: &mut [String], open: &[Option<usize>], text: &str) {
    for slot in open.iter().flatten() {
        found[*slot].push_str(text);
    }
}
