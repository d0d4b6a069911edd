//! # Hierarchical Source Nodes
//!
//! The in-memory model of a hierarchical scientific data file (NeXus/HDF5)
//! as handed over by a [`reader`](crate::reader). The tree is read-only to
//! the metadata engine: readers build it once, the flattener walks it.
//!
//! Nodes are an explicit tagged union instead of runtime introspection:
//!
//! - [`Group`]: named container with an optional `NX_class`
//! - [`Field`]: dataset with a [`DType`], a shape and a value
//! - [`Attribute`]: small named value attached to a group or field
//! - [`Link`]: a soft link, carrying the resolved target when available
//!
//! Values are kept as JSON values so the flattener can copy them straight
//! into the metadata record. A value that could not be read is kept as a
//! [`ReadError`] on the node; the flattener skips such nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute holding a group's NeXus class
pub const NX_CLASS: &str = "NX_class";

/// Failure to extract the value of a single field or attribute
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot read '{node}': {reason}")]
pub struct ReadError {
    /// Name of the node whose value failed to read
    pub node: String,
    /// Reader-specific description of the failure
    pub reason: String,
}

impl ReadError {
    /// Create a read error for the named node
    pub fn new(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

/// Element type of a field or attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Text
    String,
    /// Anything the reader could not classify (compound, opaque, ...)
    #[default]
    Unknown,
}

impl DType {
    /// Check whether the type is numeric
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DType::Bool | DType::String | DType::Unknown)
    }
}

/// Discriminator of a [`HierarchicalNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Container node
    Group,
    /// Dataset node
    Field,
    /// Attribute node
    Attribute,
    /// Soft link node
    Link,
}

/// A node of the source tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HierarchicalNode {
    /// Container node
    Group(Group),
    /// Dataset node
    Field(Field),
    /// Attribute listed among the children of a group
    Attribute(Attribute),
    /// Soft link node
    Link(Link),
}

impl HierarchicalNode {
    /// Local name of the node
    pub fn name(&self) -> &str {
        match self {
            HierarchicalNode::Group(g) => &g.name,
            HierarchicalNode::Field(f) => &f.name,
            HierarchicalNode::Attribute(a) => &a.name,
            HierarchicalNode::Link(l) => &l.name,
        }
    }

    /// Kind of the node
    pub fn kind(&self) -> NodeKind {
        match self {
            HierarchicalNode::Group(_) => NodeKind::Group,
            HierarchicalNode::Field(_) => NodeKind::Field,
            HierarchicalNode::Attribute(_) => NodeKind::Attribute,
            HierarchicalNode::Link(_) => NodeKind::Link,
        }
    }

    /// The node itself, or the resolved target for links
    ///
    /// Returns `None` for dangling links.
    pub fn resolve(&self) -> Option<&HierarchicalNode> {
        match self {
            HierarchicalNode::Link(link) => link.node.as_deref().and_then(|n| n.resolve()),
            other => Some(other),
        }
    }

    /// Target path of a link
    pub fn link_target(&self) -> Option<&str> {
        match self {
            HierarchicalNode::Link(link) => Some(&link.target),
            _ => None,
        }
    }

    /// Group view of the node, following links
    pub fn as_group(&self) -> Option<&Group> {
        match self.resolve()? {
            HierarchicalNode::Group(g) => Some(g),
            _ => None,
        }
    }
}

/// Container node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Local name
    pub name: String,
    /// NeXus class (e.g. "NXentry")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nx_class: Option<String>,
    /// Attributes attached to the group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Child nodes in file order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchicalNode>,
}

impl Group {
    /// Create an empty group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the NeXus class (builder pattern)
    pub fn with_class(mut self, nx_class: impl Into<String>) -> Self {
        self.nx_class = Some(nx_class.into());
        self
    }

    /// Add an attribute (builder pattern)
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a child node (builder pattern)
    pub fn with_child(mut self, child: impl Into<HierarchicalNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// NeXus class, from the explicit class or the `NX_class` attribute
    pub fn class(&self) -> Option<String> {
        if let Some(class) = &self.nx_class {
            return Some(class.clone());
        }
        self.attributes
            .iter()
            .find(|a| a.name == NX_CLASS)
            .and_then(|a| a.read().ok())
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Child node by local name
    pub fn child(&self, name: &str) -> Option<&HierarchicalNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Child groups (links resolved), in file order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Group)> {
        self.children
            .iter()
            .filter_map(|c| c.as_group().map(|g| (c.name(), g)))
    }

    /// Child fields (links resolved), in file order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.children.iter().filter_map(|c| match c.resolve()? {
            HierarchicalNode::Field(f) => Some((c.name(), f)),
            _ => None,
        })
    }

    /// All attributes: the attribute list followed by attribute children
    pub fn all_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .chain(self.children.iter().filter_map(|c| match c {
                HierarchicalNode::Attribute(a) => Some(a),
                _ => None,
            }))
    }
}

/// Dataset node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Local name
    pub name: String,
    /// Element type
    #[serde(default)]
    pub dtype: DType,
    /// Dimensions; empty for scalars
    #[serde(default)]
    pub shape: Vec<usize>,
    /// Value, when the reader materialized it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Reader failure for this field's value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attributes attached to the field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl Field {
    /// Create a scalar field
    pub fn scalar(name: impl Into<String>, dtype: DType, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape: Vec::new(),
            value: Some(value.into()),
            error: None,
            attributes: Vec::new(),
        }
    }

    /// Create a scalar string field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::scalar(name, DType::String, Value::String(value.into()))
    }

    /// Create an array field
    pub fn array(name: impl Into<String>, dtype: DType, shape: Vec<usize>, value: Value) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
            value: Some(value),
            error: None,
            attributes: Vec::new(),
        }
    }

    /// Add an attribute (builder pattern)
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Number of dimensions; a single-element array counts as a scalar
    pub fn rank(&self) -> usize {
        match self.shape.as_slice() {
            [] | [1] => 0,
            shape => shape.len(),
        }
    }

    /// Read the value
    pub fn read(&self) -> Result<&Value, ReadError> {
        read_value(&self.name, self.value.as_ref(), self.error.as_deref())
    }
}

/// Small named value attached to a group or field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Local name
    pub name: String,
    /// Element type
    #[serde(default)]
    pub dtype: DType,
    /// Dimensions; empty for scalars
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<usize>,
    /// Value, when the reader materialized it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Reader failure for this attribute's value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attribute {
    /// Create a string attribute
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: DType::String,
            shape: Vec::new(),
            value: Some(Value::String(value.into())),
            error: None,
        }
    }

    /// Create an attribute with an arbitrary value
    pub fn new(name: impl Into<String>, dtype: DType, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape: Vec::new(),
            value: Some(value.into()),
            error: None,
        }
    }

    /// Read the value
    pub fn read(&self) -> Result<&Value, ReadError> {
        read_value(&self.name, self.value.as_ref(), self.error.as_deref())
    }
}

/// Soft link node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Local name
    pub name: String,
    /// Absolute path of the link target
    pub target: String,
    /// Resolved target, when the reader could follow the link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Box<HierarchicalNode>>,
}

fn read_value<'a>(
    name: &str,
    value: Option<&'a Value>,
    error: Option<&str>,
) -> Result<&'a Value, ReadError> {
    if let Some(reason) = error {
        return Err(ReadError::new(name, reason));
    }
    value.ok_or_else(|| ReadError::new(name, "value not materialized"))
}

impl From<Group> for HierarchicalNode {
    fn from(group: Group) -> Self {
        HierarchicalNode::Group(group)
    }
}

impl From<Field> for HierarchicalNode {
    fn from(field: Field) -> Self {
        HierarchicalNode::Field(field)
    }
}

impl From<Attribute> for HierarchicalNode {
    fn from(attribute: Attribute) -> Self {
        HierarchicalNode::Attribute(attribute)
    }
}

impl From<Link> for HierarchicalNode {
    fn from(link: Link) -> Self {
        HierarchicalNode::Link(link)
    }
}
