//! Minimal element tree built on quick-xml.
//!
//! The feed is small (a few thousand rows) so we materialize it and let the
//! normalizer walk named children instead of driving a state machine.

use quick_xml::events::Event;
use quick_xml::Reader;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Default)]
pub(crate) struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child called `name`, or "" when absent.
    pub fn child_text(&self, name: &str) -> &str {
        self.child(name).map(|c| c.text.as_str()).unwrap_or("")
    }
}

/// Parse a whole document. Errors carry human-readable diagnostics.
pub(crate) fn parse_document(bytes: &[u8]) -> Result<Element, Vec<String>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) => {
                return Err(vec![format!("{} (at byte {})", e, reader.buffer_position())]);
            }
        };

        match event {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(vec!["Extra content at the end of the document".into()]);
                }
                let name = element_name(start.local_name().as_ref())?;
                stack.push(Element { name, ..Default::default() });
            }
            Event::Empty(start) => {
                let name = element_name(start.local_name().as_ref())?;
                attach(&mut stack, &mut root, Element { name, ..Default::default() })?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| vec!["Closing tag without matching opening tag".to_string()])?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|e| vec![e.to_string()])?;
                append_text(&mut stack, &value)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                let value = std::str::from_utf8(&raw)
                    .map_err(|e| vec![format!("CDATA is not valid UTF-8: {}", e)])?;
                append_text(&mut stack, value)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(vec![format!("Premature end of data in tag <{}>", open.name)]);
    }
    root.ok_or_else(|| vec!["Document is empty".to_string()])
}

fn element_name(raw: &[u8]) -> Result<String, Vec<String>> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| vec![format!("Element name is not valid UTF-8: {}", e)])
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), Vec<String>> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => return Err(vec!["Extra content at the end of the document".into()]),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], value: &str) -> Result<(), Vec<String>> {
    match stack.last_mut() {
        Some(el) => {
            el.text.push_str(value);
            Ok(())
        }
        None => Err(vec!["Start tag expected, '<' not found".into()]),
    }
}
