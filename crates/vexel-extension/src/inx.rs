//! Owned descriptor node tree.
//!
//! Descriptors (`.vex` files) are parsed once into an owned tree of
//! [`InxNode`]s shared through `Arc`. An [`crate::Extension`] keeps a
//! handle to the node it was built from for as long as it lives; the
//! loader and any enclosing document keep their own handles. Dropping a
//! handle never frees the node while another holder remains.

use std::sync::Arc;

use crate::error::Result;

/// Namespace URI for extension vocabulary elements.
pub const EXTENSION_NS_URI: &str = "http://vexel.org/namespace/extension";

/// Canonical qualified-name prefix for elements in the extension
/// namespace, as stored on parsed nodes.
pub const EXTENSION_NS_PREFIX: &str = "vexel.extension:";

/// Node kinds preserved from the descriptor source.
///
/// Comments are kept: the legacy `<script>` scan has to step over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

/// One node of a parsed descriptor.
#[derive(Debug)]
pub struct InxNode {
    kind: NodeKind,
    /// Qualified element name (`vexel.extension:id` for namespaced
    /// elements, plain local name otherwise). Empty for text/comment.
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Arc<InxNode>>,
    /// Character data for text and comment nodes.
    text: String,
}

impl InxNode {
    /// Parse descriptor text into a shared node tree rooted at the
    /// document element.
    pub fn parse(xml: &str) -> Result<Arc<InxNode>> {
        let doc = roxmltree::Document::parse(xml)?;
        Ok(Arc::new(Self::from_xml(doc.root_element())))
    }

    fn from_xml(node: roxmltree::Node<'_, '_>) -> InxNode {
        let tag = node.tag_name();
        let name = match tag.namespace() {
            Some(EXTENSION_NS_URI) => format!("{}{}", EXTENSION_NS_PREFIX, tag.name()),
            _ => tag.name().to_string(),
        };

        let attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();

        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Arc::new(Self::from_xml(child)));
            } else if child.is_text() {
                let text = child.text().unwrap_or("");
                if !text.trim().is_empty() {
                    children.push(Arc::new(InxNode {
                        kind: NodeKind::Text,
                        name: String::new(),
                        attributes: Vec::new(),
                        children: Vec::new(),
                        text: text.to_string(),
                    }));
                }
            } else if child.is_comment() {
                children.push(Arc::new(InxNode {
                    kind: NodeKind::Comment,
                    name: String::new(),
                    attributes: Vec::new(),
                    children: Vec::new(),
                    text: child.text().unwrap_or("").to_string(),
                }));
            }
        }

        InxNode {
            kind: NodeKind::Element,
            name,
            attributes,
            children,
            text: String::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Qualified node name as stored (see [`EXTENSION_NS_PREFIX`]).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element name with the extension-namespace prefix and one legacy
    /// leading underscore stripped.
    ///
    /// Old descriptors marked translatable elements with a leading
    /// underscore (`<_name>`); both spellings resolve to the same tag.
    pub fn local_name(&self) -> &str {
        let name = self
            .name
            .strip_prefix(EXTENSION_NS_PREFIX)
            .unwrap_or(&self.name);
        name.strip_prefix('_').unwrap_or(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &Arc<InxNode>> {
        self.children.iter()
    }

    /// Character data of a text or comment node.
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Element => None,
            _ => Some(&self.text),
        }
    }

    /// Trimmed text content of this element's first text child.
    ///
    /// Returns `None` for childless elements and for content that trims
    /// to nothing, so `<id/>` and `<id>  </id>` both read as absent.
    pub fn text_content(&self) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.kind == NodeKind::Text)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }
}
