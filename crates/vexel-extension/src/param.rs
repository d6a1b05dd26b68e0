//! Typed extension parameters.
//!
//! Parameters are declared by `<param name=".." type="..">` elements in
//! a descriptor. The declaration carries the default value; hosts may
//! shadow defaults per document or per node by passing a [`ParamStore`]
//! into the typed accessors. Composite parameters (`notebook` pages)
//! nest further parameters, which is what makes the extension-level
//! lookup a depth-first search.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ExtensionError, Result};
use crate::inx::InxNode;

/// A parameter value, also the carrier of type-specific declaration
/// metadata (bounds, option lists, nested parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamValue {
    Bool(bool),
    Int { value: i64, min: i64, max: i64 },
    Float { value: f64, min: f64, max: f64 },
    Text(String),
    OptionGroup { value: String, options: Vec<String> },
    /// Packed RGBA.
    Color(u32),
    /// Composite node: a notebook or one of its pages.
    Page(Vec<Parameter>),
}

/// Host-side value overrides, keyed by parameter name.
///
/// The editor keeps one store per document (and one per node where a
/// parameter is node-bound) and passes the most specific one into the
/// typed accessors; a value present here shadows the declaration
/// default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamStore {
    values: HashMap<String, ParamValue>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tooltip: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    indent: u32,
    value: ParamValue,
}

impl Parameter {
    /// Build a parameter from a `<param>` element.
    ///
    /// Returns `None` for declarations this build cannot represent
    /// (missing name, unknown type); the caller skips those rather than
    /// failing the whole extension.
    pub fn make(node: &InxNode) -> Option<Parameter> {
        let Some(name) = node.attribute("name") else {
            tracing::warn!("skipping parameter without a name attribute");
            return None;
        };

        let ty = node.attribute("type").unwrap_or("");
        let value = match ty {
            "bool" | "boolean" => ParamValue::Bool(parse_bool(node.text_content())),
            "int" => {
                let min = parse_attr(node, "min").unwrap_or(i64::MIN);
                let max = parse_attr(node, "max").unwrap_or(i64::MAX);
                let value = node
                    .text_content()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(0)
                    .clamp(min, max);
                ParamValue::Int { value, min, max }
            }
            "float" => {
                let min = parse_attr(node, "min").unwrap_or(f64::NEG_INFINITY);
                let max = parse_attr(node, "max").unwrap_or(f64::INFINITY);
                let value = node
                    .text_content()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(0.0_f64)
                    .clamp(min, max);
                ParamValue::Float { value, min, max }
            }
            "string" => ParamValue::Text(node.text_content().unwrap_or("").to_string()),
            "optiongroup" | "enum" => {
                let options: Vec<String> = node
                    .children()
                    .filter(|c| c.is_element())
                    .filter(|c| matches!(c.local_name(), "option" | "item"))
                    .filter_map(|c| {
                        c.attribute("value")
                            .or_else(|| c.text_content())
                            .map(str::to_string)
                    })
                    .collect();
                let value = options.first().cloned().unwrap_or_default();
                ParamValue::OptionGroup { value, options }
            }
            "color" => ParamValue::Color(parse_color(node.text_content())),
            "notebook" => {
                let pages = node
                    .children()
                    .filter(|c| c.is_element() && c.local_name() == "page")
                    .filter_map(|page| {
                        let name = page.attribute("name")?;
                        let children = page
                            .children()
                            .filter(|c| c.is_element() && c.local_name() == "param")
                            .filter_map(|c| Parameter::make(c))
                            .collect();
                        Some(Parameter {
                            name: name.to_string(),
                            label: page.attribute("gui-text").map(str::to_string),
                            tooltip: None,
                            hidden: false,
                            indent: 0,
                            value: ParamValue::Page(children),
                        })
                    })
                    .collect();
                ParamValue::Page(pages)
            }
            other => {
                tracing::warn!(name, ty = other, "skipping parameter of unknown type");
                return None;
            }
        };

        Some(Parameter {
            name: name.to_string(),
            label: node.attribute("gui-text").map(str::to_string),
            tooltip: node.attribute("gui-description").map(str::to_string),
            hidden: matches!(node.attribute("gui-hidden"), Some("true") | Some("1")),
            indent: parse_attr(node, "indent").unwrap_or(0),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn indent(&self) -> u32 {
        self.indent
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Look for a parameter of the given name among this parameter's
    /// descendants (first match in declaration order, depth-first).
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        if let ParamValue::Page(children) = &self.value {
            for child in children {
                if child.name == name {
                    return Some(child);
                }
                if let Some(sub) = child.find(name) {
                    return Some(sub);
                }
            }
        }
        None
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        if let ParamValue::Page(children) = &mut self.value {
            for child in children {
                if child.name == name {
                    return Some(child);
                }
                // Split the borrow: only recurse when the child owns a match.
                if child.find(name).is_some() {
                    return child.find_mut(name);
                }
            }
        }
        None
    }

    fn effective<'a>(&'a self, store: Option<&'a ParamStore>) -> &'a ParamValue {
        store
            .and_then(|s| s.get(&self.name))
            .unwrap_or(&self.value)
    }

    fn wrong_type(&self, expected: &'static str) -> ExtensionError {
        ExtensionError::WrongParameterType {
            name: self.name.clone(),
            expected,
        }
    }

    pub fn get_bool(&self, store: Option<&ParamStore>) -> Result<bool> {
        match self.effective(store) {
            ParamValue::Bool(b) => Ok(*b),
            _ => Err(self.wrong_type("bool")),
        }
    }

    pub fn get_int(&self, store: Option<&ParamStore>) -> Result<i64> {
        match self.effective(store) {
            ParamValue::Int { value, .. } => Ok(*value),
            _ => Err(self.wrong_type("int")),
        }
    }

    pub fn get_float(&self, store: Option<&ParamStore>) -> Result<f64> {
        match self.effective(store) {
            ParamValue::Float { value, .. } => Ok(*value),
            _ => Err(self.wrong_type("float")),
        }
    }

    pub fn get_string<'a>(&'a self, store: Option<&'a ParamStore>) -> Result<&'a str> {
        match self.effective(store) {
            ParamValue::Text(s) => Ok(s),
            _ => Err(self.wrong_type("string")),
        }
    }

    pub fn get_optiongroup<'a>(&'a self, store: Option<&'a ParamStore>) -> Result<&'a str> {
        match self.effective(store) {
            ParamValue::OptionGroup { value, .. } => Ok(value),
            _ => Err(self.wrong_type("optiongroup")),
        }
    }

    /// Whether `value` is one of the declared options of this
    /// option-group parameter.
    pub fn get_optiongroup_contains(&self, value: &str) -> Result<bool> {
        match &self.value {
            ParamValue::OptionGroup { options, .. } => {
                Ok(options.iter().any(|o| o == value))
            }
            _ => Err(self.wrong_type("optiongroup")),
        }
    }

    pub fn get_color(&self, store: Option<&ParamStore>) -> Result<u32> {
        match self.effective(store) {
            ParamValue::Color(c) => Ok(*c),
            _ => Err(self.wrong_type("color")),
        }
    }

    pub fn set_bool(&mut self, value: bool, store: Option<&mut ParamStore>) -> Result<bool> {
        if !matches!(self.value, ParamValue::Bool(_)) {
            return Err(self.wrong_type("bool"));
        }
        self.write(ParamValue::Bool(value), store);
        Ok(value)
    }

    /// Set an int parameter; the value is clamped to the declared
    /// bounds and the stored value is returned.
    pub fn set_int(&mut self, value: i64, store: Option<&mut ParamStore>) -> Result<i64> {
        let ParamValue::Int { min, max, .. } = self.value else {
            return Err(self.wrong_type("int"));
        };
        let value = value.clamp(min, max);
        self.write(ParamValue::Int { value, min, max }, store);
        Ok(value)
    }

    pub fn set_float(&mut self, value: f64, store: Option<&mut ParamStore>) -> Result<f64> {
        let ParamValue::Float { min, max, .. } = self.value else {
            return Err(self.wrong_type("float"));
        };
        let value = value.clamp(min, max);
        self.write(ParamValue::Float { value, min, max }, store);
        Ok(value)
    }

    pub fn set_string(&mut self, value: &str, store: Option<&mut ParamStore>) -> Result<()> {
        if !matches!(self.value, ParamValue::Text(_)) {
            return Err(self.wrong_type("string"));
        }
        self.write(ParamValue::Text(value.to_string()), store);
        Ok(())
    }

    /// Set an option-group parameter; values outside the declared
    /// option list are rejected.
    pub fn set_optiongroup(&mut self, value: &str, store: Option<&mut ParamStore>) -> Result<()> {
        let ParamValue::OptionGroup { options, .. } = &self.value else {
            return Err(self.wrong_type("optiongroup"));
        };
        if !options.iter().any(|o| o == value) {
            return Err(ExtensionError::UnknownOption {
                name: self.name.clone(),
                value: value.to_string(),
            });
        }
        let options = options.clone();
        self.write(
            ParamValue::OptionGroup {
                value: value.to_string(),
                options,
            },
            store,
        );
        Ok(())
    }

    pub fn set_color(&mut self, value: u32, store: Option<&mut ParamStore>) -> Result<u32> {
        if !matches!(self.value, ParamValue::Color(_)) {
            return Err(self.wrong_type("color"));
        }
        self.write(ParamValue::Color(value), store);
        Ok(value)
    }

    fn write(&mut self, value: ParamValue, store: Option<&mut ParamStore>) {
        match store {
            Some(store) => store.set(&self.name, value),
            None => self.value = value,
        }
    }

    /// Append this parameter (and, for composites, every nested one) as
    /// `--name=value` arguments, the form script implementations are
    /// invoked with.
    pub fn command_line(&self, out: &mut Vec<String>, store: Option<&ParamStore>) {
        match self.effective(store) {
            ParamValue::Bool(b) => out.push(format!("--{}={}", self.name, b)),
            ParamValue::Int { value, .. } => out.push(format!("--{}={}", self.name, value)),
            ParamValue::Float { value, .. } => out.push(format!("--{}={}", self.name, value)),
            ParamValue::Text(s) => out.push(format!("--{}={}", self.name, s)),
            ParamValue::OptionGroup { value, .. } => {
                out.push(format!("--{}={}", self.name, value))
            }
            ParamValue::Color(c) => out.push(format!("--{}={}", self.name, c)),
            ParamValue::Page(children) => {
                for child in children {
                    child.command_line(out, store);
                }
            }
        }
    }
}

fn parse_bool(text: Option<&str>) -> bool {
    matches!(text, Some("true") | Some("1"))
}

fn parse_attr<T: std::str::FromStr>(node: &InxNode, name: &str) -> Option<T> {
    node.attribute(name).and_then(|v| v.parse().ok())
}

/// Color content is either `0x`-prefixed hex or a decimal RGBA word.
fn parse_color(text: Option<&str>) -> u32 {
    let Some(text) = text else { return 0 };
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).unwrap_or(0)
    } else {
        text.parse().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn param(xml: &str) -> Parameter {
        let root = InxNode::parse(xml).unwrap();
        Parameter::make(&root).unwrap()
    }

    fn first_child(xml: &str) -> Arc<InxNode> {
        let root = InxNode::parse(xml).unwrap();
        let child = root.children().next().unwrap().clone();
        child
    }

    #[test]
    fn test_make_bool() {
        let p = param(r#"<param name="flat" type="bool">true</param>"#);
        assert_eq!(p.get_bool(None).unwrap(), true);

        let p = param(r#"<param name="flat" type="boolean">0</param>"#);
        assert_eq!(p.get_bool(None).unwrap(), false);
    }

    #[test]
    fn test_int_clamps_on_set() {
        let mut p = param(r#"<param name="steps" type="int" min="1" max="10">4</param>"#);
        assert_eq!(p.get_int(None).unwrap(), 4);
        assert_eq!(p.set_int(25, None).unwrap(), 10);
        assert_eq!(p.get_int(None).unwrap(), 10);
        assert_eq!(p.set_int(-3, None).unwrap(), 1);
    }

    #[test]
    fn test_declared_default_clamped() {
        let p = param(r#"<param name="steps" type="int" min="1" max="10">99</param>"#);
        assert_eq!(p.get_int(None).unwrap(), 10);
    }

    #[test]
    fn test_optiongroup() {
        let mut p = param(
            r#"<param name="unit" type="optiongroup">
                 <option value="mm">Millimeters</option>
                 <option value="px">Pixels</option>
               </param>"#,
        );
        assert_eq!(p.get_optiongroup(None).unwrap(), "mm");
        assert!(p.get_optiongroup_contains("px").unwrap());
        assert!(!p.get_optiongroup_contains("pt").unwrap());

        p.set_optiongroup("px", None).unwrap();
        assert_eq!(p.get_optiongroup(None).unwrap(), "px");

        let err = p.set_optiongroup("pt", None).unwrap_err();
        assert!(matches!(err, ExtensionError::UnknownOption { .. }));
    }

    #[test]
    fn test_color_parsing() {
        let p = param(r#"<param name="fill" type="color">0xff0000ff</param>"#);
        assert_eq!(p.get_color(None).unwrap(), 0xff0000ff);

        let p = param(r#"<param name="fill" type="color">255</param>"#);
        assert_eq!(p.get_color(None).unwrap(), 255);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let p = param(r#"<param name="flat" type="bool">true</param>"#);
        assert!(matches!(
            p.get_int(None),
            Err(ExtensionError::WrongParameterType { .. })
        ));
    }

    #[test]
    fn test_store_shadows_default() {
        let p = param(r#"<param name="flat" type="bool">false</param>"#);
        let mut store = ParamStore::new();
        store.set("flat", ParamValue::Bool(true));

        assert_eq!(p.get_bool(Some(&store)).unwrap(), true);
        assert_eq!(p.get_bool(None).unwrap(), false);
    }

    #[test]
    fn test_set_with_store_leaves_default() {
        let mut p = param(r#"<param name="steps" type="int" min="0" max="100">5</param>"#);
        let mut store = ParamStore::new();

        assert_eq!(p.set_int(42, Some(&mut store)).unwrap(), 42);
        assert_eq!(p.get_int(Some(&store)).unwrap(), 42);
        assert_eq!(p.get_int(None).unwrap(), 5);
    }

    #[test]
    fn test_notebook_nested_find() {
        let p = param(
            r#"<param name="options" type="notebook">
                 <page name="basic" gui-text="Basic">
                   <param name="radius" type="float" min="0" max="50">2.5</param>
                 </page>
                 <page name="advanced" gui-text="Advanced">
                   <param name="threshold" type="int">3</param>
                 </page>
               </param>"#,
        );

        assert_eq!(p.find("radius").unwrap().get_float(None).unwrap(), 2.5);
        assert_eq!(p.find("threshold").unwrap().get_int(None).unwrap(), 3);
        assert!(p.find("basic").is_some());
        assert!(p.find("missing").is_none());
    }

    #[test]
    fn test_make_skips_unknown_type() {
        let node = first_child(
            r#"<params><param name="x" type="matrix">1</param></params>"#,
        );
        assert!(Parameter::make(&node).is_none());
    }

    #[test]
    fn test_make_skips_missing_name() {
        let node = first_child(r#"<params><param type="bool">1</param></params>"#);
        assert!(Parameter::make(&node).is_none());
    }

    #[test]
    fn test_serializes_for_listings() {
        let p = param(r#"<param name="steps" type="int" min="1" max="10" gui-text="Steps">4</param>"#);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["name"], "steps");
        assert_eq!(json["label"], "Steps");
        assert_eq!(json["value"]["int"]["value"], 4);
    }

    #[test]
    fn test_command_line() {
        let p = param(
            r#"<param name="options" type="notebook">
                 <page name="basic">
                   <param name="radius" type="float">2.5</param>
                   <param name="unit" type="optiongroup">
                     <option value="mm">mm</option>
                   </param>
                 </page>
               </param>"#,
        );

        let mut out = Vec::new();
        p.command_line(&mut out, None);
        assert_eq!(out, vec!["--radius=2.5", "--unit=mm"]);
    }
}
