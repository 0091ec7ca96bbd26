// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! The metadata document exchanged with the scheduling and ingest services
//!
//! Fields render into a [`DocumentTree`], a small element arena addressed by [`NodeId`].
//! The tree is converted into the logical [`MetadataDocument`] shape, which can be written
//! as XML or JSON.

use crate::error::{FormError, Result};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

pub const METADATA_LIST: &str = "metadataList";
pub const METADATA: &str = "metadata";
pub const KEY: &str = "key";
pub const VALUE: &str = "value";

/// Handle of a node inside a [`DocumentTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Builds a handle from a raw index, the handle is checked on use
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// Returned when a node handle does not belong to the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingNode(pub NodeId);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }
}

/// An element tree, node 0 is the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<Element>,
}

impl DocumentTree {
    pub fn new(root: &str, namespace: Option<&str>) -> Self {
        let mut element = Element::new(root);
        if let Some(namespace) = namespace {
            element
                .attributes
                .push(("xmlns".to_owned(), namespace.to_owned()));
        }

        Self {
            nodes: vec![element],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> std::result::Result<NodeId, MissingNode> {
        if !self.contains(parent) {
            return Err(MissingNode(parent));
        }

        let node = NodeId(self.nodes.len());
        self.nodes.push(Element::new(name));
        self.nodes[parent.0].children.push(node);
        Ok(node)
    }

    pub fn append_text_element(
        &mut self,
        parent: NodeId,
        name: &str,
        text: &str,
    ) -> std::result::Result<NodeId, MissingNode> {
        let node = self.append_element(parent, name)?;
        self.nodes[node.0].text = Some(text.to_owned());
        Ok(node)
    }

    /// Appends a `<metadata><key/><value/></metadata>` pair to `parent`
    pub fn append_metadata(
        &mut self,
        parent: NodeId,
        key: &str,
        value: &str,
    ) -> std::result::Result<NodeId, MissingNode> {
        let node = self.append_element(parent, METADATA)?;
        self.append_text_element(node, KEY, key)?;
        self.append_text_element(node, VALUE, value)?;
        Ok(node)
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|e| e.name.as_str())
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).and_then(|e| e.text.as_deref())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node.0).and_then(|e| {
            e.attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// First direct child of `node` with the given name
    pub fn child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|child| self.name(*child) == Some(name))
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_node(&mut writer, self.root())?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| FormError::MalformedDocument(e.to_string()))
    }

    fn write_node(&self, writer: &mut Writer<Cursor<Vec<u8>>>, node: NodeId) -> Result<()> {
        let element = &self.nodes[node.0];

        let mut start = BytesStart::new(element.name.as_str());
        for (key, value) in &element.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if element.children.is_empty() && element.text.is_none() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = &element.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &element.children {
            self.write_node(writer, *child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;

        Ok(())
    }

    /// Parses an XML document, namespace prefixes of element names are dropped
    ///
    /// Text is kept as written. Whitespace only text next to child elements is indentation
    /// and is dropped.
    pub fn parse_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);

        let mut tree: Option<DocumentTree> = None;
        let mut open: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let element = element_from(&start)?;
                    let node = Self::push(&mut tree, open.last().copied(), element)?;
                    open.push(node);
                }
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    Self::push(&mut tree, open.last().copied(), element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    Self::push_text(&mut tree, open.last().copied(), &text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    Self::push_text(&mut tree, open.last().copied(), &text);
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        tree.ok_or_else(|| FormError::MalformedDocument("document has no root element".into()))
    }

    fn push(
        tree: &mut Option<DocumentTree>,
        parent: Option<NodeId>,
        element: Element,
    ) -> Result<NodeId> {
        match (tree.as_mut(), parent) {
            (None, _) => {
                *tree = Some(DocumentTree {
                    nodes: vec![element],
                });
                Ok(NodeId(0))
            }
            (Some(tree), Some(parent)) => {
                let node = NodeId(tree.nodes.len());
                tree.nodes.push(element);

                let parent = &mut tree.nodes[parent.0];
                parent.children.push(node);
                if parent.text.as_deref().is_some_and(is_blank) {
                    parent.text = None;
                }
                Ok(node)
            }
            (Some(_), None) => Err(FormError::MalformedDocument(
                "more than one root element".into(),
            )),
        }
    }

    fn push_text(tree: &mut Option<DocumentTree>, node: Option<NodeId>, text: &str) {
        if let (Some(tree), Some(node)) = (tree.as_mut(), node) {
            let element = &mut tree.nodes[node.0];
            if is_blank(text) && !element.children.is_empty() {
                return;
            }
            element
                .text
                .get_or_insert_with(String::new)
                .push_str(text);
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut element = Element::new(&name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        element.attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            attribute.unescape_value()?.into_owned(),
        ));
    }

    Ok(element)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

/// Logical shape of the metadata document
///
/// `promoted` holds the values rendered as direct children of the root (identifier,
/// recurrence rule), `metadata_list` every other key/value pair in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub promoted: IndexMap<String, String>,
    #[serde(default)]
    pub metadata_list: Vec<MetadataEntry>,
}

impl MetadataDocument {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata_list.push(MetadataEntry {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn promote(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.promoted.insert(name.into(), value.into());
    }

    /// Looks a key up, promoted values first, then the first matching metadata entry
    pub fn get(&self, key: &str) -> Option<&str> {
        self.promoted.get(key).map(String::as_str).or_else(|| {
            self.metadata_list
                .iter()
                .find(|entry| entry.key == key)
                .map(|entry| entry.value.as_str())
        })
    }

    pub fn from_tree(tree: &DocumentTree) -> Result<Self> {
        let root = tree.root();
        let mut document = Self {
            root: tree.name(root).unwrap_or_default().to_owned(),
            namespace: tree.attribute(root, "xmlns").map(str::to_owned),
            ..Default::default()
        };

        for &child in tree.children(root) {
            let name = tree.name(child).unwrap_or_default();
            if name != METADATA_LIST {
                document.promote(name, tree.text(child).unwrap_or_default());
                continue;
            }

            for &entry in tree.children(child) {
                if tree.name(entry) != Some(METADATA) {
                    continue;
                }
                let key = tree
                    .child(entry, KEY)
                    .and_then(|key| tree.text(key))
                    .ok_or_else(|| {
                        FormError::MalformedDocument("metadata entry without key".into())
                    })?;
                let value = tree
                    .child(entry, VALUE)
                    .and_then(|value| tree.text(value))
                    .unwrap_or_default();
                document.push(key, value);
            }
        }

        Ok(document)
    }

    pub fn to_tree(&self) -> DocumentTree {
        let mut tree = DocumentTree::new(&self.root, self.namespace.as_deref());
        let root = tree.root();

        // The root always exists, appending to it cannot fail
        for (name, value) in &self.promoted {
            let _ = tree.append_text_element(root, name, value);
        }
        if let Ok(list) = tree.append_element(root, METADATA_LIST) {
            for entry in &self.metadata_list {
                let _ = tree.append_metadata(list, &entry.key, &entry.value);
            }
        }

        tree
    }

    pub fn to_xml(&self) -> Result<String> {
        self.to_tree().to_xml()
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_tree(&DocumentTree::parse_xml(xml)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
