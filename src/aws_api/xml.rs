use crate::aws_api::error::Error;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Minimal element tree for Query protocol responses. Attributes and
/// namespaces are dropped, only local names and text are kept.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn parse(body: &[u8]) -> Result<XmlElement, Error> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) => stack.push(XmlElement::named(e.local_name().as_ref())),
                Event::Empty(e) => {
                    let elem = XmlElement::named(e.local_name().as_ref());
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(elem),
                        None => root = Some(elem),
                    }
                }
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        let text = t.unescape().map_err(|e| Error::XmlError(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(t) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(t.into_inner().as_ref()));
                    }
                }
                Event::End(_) => {
                    let elem = stack
                        .pop()
                        .ok_or_else(|| Error::XmlError("unbalanced end tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(elem),
                        None => root = Some(elem),
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::XmlError("unexpected end of document".to_string()));
        }

        root.ok_or_else(|| Error::XmlError("empty document".to_string()))
    }

    fn named(name: &[u8]) -> Self {
        XmlElement {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follows a path of child names from this element.
    pub fn find(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |elem, name| elem.child(name))
    }

    pub fn find_text(&self, path: &[&str]) -> Option<&str> {
        self.find(path).map(|e| e.text.as_str())
    }

    /// Depth first search for the first element with the given name.
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }
}
