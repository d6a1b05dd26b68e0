//! The extension core: descriptor parsing, lifecycle, validation and
//! parameter dispatch.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dependency::Dependency;
use crate::error::{ExtensionError, Result};
use crate::implementation::{DefaultImplementation, Implementation};
use crate::inx::InxNode;
use crate::log::ErrorLog;
use crate::param::{ParamStore, Parameter};
use crate::registry::{Registry, SharedExtension};
use crate::timer::ExpirationTimer;

/// Extension ids that only function on Windows; [`Extension::check`]
/// fails them everywhere else.
const WINDOWS_ONLY: &[&str] = &["org.vexel.print.win32"];

/// Lifecycle state of an extension.
///
/// `Deactivated` is absorbing: once entered, no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Unloaded,
    Loaded,
    Deactivated,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => write!(f, "Unloaded"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Deactivated => write!(f, "Deactivated"),
        }
    }
}

/// The parsed, identity-bearing part of an extension: everything the
/// descriptor declared. This is what [`Implementation`] calls receive.
pub struct Descriptor {
    repr: Arc<InxNode>,
    id: String,
    name: String,
    parameters: Vec<Parameter>,
    dependencies: Vec<Dependency>,
    gui: bool,
}

impl Descriptor {
    /// Parse a descriptor element.
    ///
    /// Children are scanned in document order; `id`, `name`, `param`,
    /// `dependency` and the legacy `script` form are recognized, any
    /// other tag belongs to a specific extension kind and is ignored.
    /// When a tag repeats, the last occurrence wins.
    fn from_node(repr: Arc<InxNode>) -> Result<Descriptor> {
        let mut id = None;
        let mut name = None;
        let mut parameters = Vec::new();
        let mut dependencies = Vec::new();

        for child in repr.children().filter(|c| c.is_element()) {
            match child.local_name() {
                "id" => {
                    id = Some(
                        child
                            .text_content()
                            .ok_or(ExtensionError::MissingId)?
                            .to_string(),
                    );
                }
                "name" => {
                    name = Some(
                        child
                            .text_content()
                            .ok_or(ExtensionError::MissingName)?
                            .to_string(),
                    );
                }
                "param" => {
                    if let Some(param) = Parameter::make(child) {
                        parameters.push(param);
                    }
                }
                "dependency" => dependencies.push(Dependency::make(child)),
                "script" => {
                    // The script command doubles as a dependency. Only
                    // the first element child counts; comments and text
                    // in between are stepped over.
                    if let Some(command) = child.children().find(|c| c.is_element()) {
                        dependencies.push(Dependency::make(command));
                    }
                }
                _ => {}
            }
        }

        let gui = !matches!(repr.attribute("gui"), Some("false") | Some("0"));
        Ok(Descriptor {
            id: id.ok_or(ExtensionError::MissingId)?,
            name: name.ok_or(ExtensionError::MissingName)?,
            repr,
            parameters,
            dependencies,
            gui,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor node this extension was built from. The handle is
    /// shared with whoever else holds the tree.
    pub fn repr(&self) -> &Arc<InxNode> {
        &self.repr
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Whether an automatic parameter form may ever be produced for
    /// this extension.
    pub fn gui(&self) -> bool {
        self.gui
    }

    /// Resolve a parameter by name: first match in declaration order,
    /// descending depth-first into composite parameters.
    pub fn get_param(&self, name: &str) -> Result<&Parameter> {
        for param in &self.parameters {
            if param.name() == name {
                return Ok(param);
            }
            if let Some(sub) = param.find(name) {
                return Ok(sub);
            }
        }
        Err(ExtensionError::ParameterNotFound(name.to_string()))
    }

    /// Mutable variant of [`get_param`](Self::get_param).
    pub fn get_param_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        for param in &mut self.parameters {
            if param.name() == name {
                return Ok(param);
            }
            // Split the borrow: only recurse when the child owns a match.
            if param.find(name).is_some() {
                return Ok(param.find_mut(name).unwrap());
            }
        }
        Err(ExtensionError::ParameterNotFound(name.to_string()))
    }
}

/// One pluggable module: identity, parameters, dependencies, a behavior
/// strategy and a lifecycle.
pub struct Extension {
    descriptor: Descriptor,
    state: State,
    implementation: Box<dyn Implementation>,
    timer: Option<ExpirationTimer>,
    loaded_at: Option<DateTime<Utc>>,
}

impl Extension {
    /// Parse a descriptor node into an unregistered extension.
    ///
    /// Fails with [`ExtensionError::MissingId`] /
    /// [`ExtensionError::MissingName`] when identity is incomplete; no
    /// partially-built extension survives. Without a supplied strategy
    /// the inert [`DefaultImplementation`] is used, so an extension is
    /// never without one.
    pub fn new(
        repr: Arc<InxNode>,
        implementation: Option<Box<dyn Implementation>>,
    ) -> Result<Extension> {
        let descriptor = Descriptor::from_node(repr)?;
        Ok(Extension {
            descriptor,
            state: State::Unloaded,
            implementation: implementation.unwrap_or_else(|| Box::new(DefaultImplementation)),
            timer: None,
            loaded_at: None,
        })
    }

    /// Parse a descriptor node and register the result.
    ///
    /// Registration happens only after identity parsing succeeded, and
    /// at most once per extension.
    pub fn build(
        repr: Arc<InxNode>,
        implementation: Option<Box<dyn Implementation>>,
        registry: &Registry,
    ) -> Result<SharedExtension> {
        let ext = Extension::new(repr, implementation)?;
        registry.register(ext)
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn loaded(&self) -> bool {
        self.state == State::Loaded
    }

    pub fn deactivated(&self) -> bool {
        self.state == State::Deactivated
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn timer(&self) -> Option<&ExpirationTimer> {
        self.timer.as_ref()
    }

    pub fn timer_mut(&mut self) -> Option<&mut ExpirationTimer> {
        self.timer.as_mut()
    }

    /// Drive the lifecycle toward `target`.
    ///
    /// No-op when already there and always a no-op once deactivated. A
    /// load that reports failure leaves the state (and the absent
    /// timer) untouched; the failure surfaces only through the
    /// unchanged state.
    pub fn set_state(&mut self, target: State) {
        if self.state == State::Deactivated {
            return;
        }
        if target == self.state {
            return;
        }
        match target {
            State::Loaded => {
                if self.implementation.load(&self.descriptor) {
                    self.state = State::Loaded;
                    self.loaded_at = Some(Utc::now());
                    self.timer = Some(ExpirationTimer::default());
                    tracing::debug!(id = self.descriptor.id(), "extension loaded");
                } else {
                    tracing::warn!(id = self.descriptor.id(), "extension failed to load");
                }
            }
            State::Unloaded => {
                self.implementation.unload(&self.descriptor);
                self.state = State::Unloaded;
                self.timer = None;
                self.loaded_at = None;
                tracing::debug!(id = self.descriptor.id(), "extension unloaded");
            }
            State::Deactivated => {
                self.state = State::Deactivated;
                self.timer = None;
                tracing::debug!(id = self.descriptor.id(), "extension deactivated");
            }
        }
    }

    /// Permanently remove this extension from service.
    ///
    /// Beyond entering the absorbing `Deactivated` state, the behavior
    /// strategy is replaced with the inert default, so no
    /// extension-supplied code can run through this extension again
    /// even for callers that bypass [`set_state`](Self::set_state).
    pub fn deactivate(&mut self) {
        self.set_state(State::Deactivated);
        self.implementation = Box::new(DefaultImplementation);
    }

    /// Validate the extension for use.
    ///
    /// Every failed probe appends a line to `log` and the probes keep
    /// going after a failure, so one run surfaces as many installation
    /// problems as possible. The strategy's own check is consulted only
    /// when everything else passed.
    pub fn check(&self, log: &ErrorLog) -> bool {
        let mut retval = true;

        if !cfg!(windows) && WINDOWS_ONLY.contains(&self.descriptor.id()) {
            self.print_failure(log, "the extension is designed for Windows only.");
            retval = false;
        }

        for dep in self.descriptor.dependencies() {
            if !dep.check() {
                self.print_failure(log, "a dependency was not met.");
                log.append(&dep.to_string());
                retval = false;
            }
        }

        if retval {
            return self.implementation.check(&self.descriptor);
        }
        retval
    }

    /// Append a standard failure line for this extension to the log.
    pub fn print_failure(&self, log: &ErrorLog, reason: &str) {
        log.append(&format!(
            "Extension \"{}\" failed to load because {}",
            self.descriptor.name(),
            reason
        ));
    }

    /// How many parameters would appear on an automatic form.
    pub fn visible_param_count(&self) -> usize {
        self.descriptor
            .parameters()
            .iter()
            .filter(|p| !p.hidden())
            .count()
    }

    /// All parameters as `--name=value` invocation arguments.
    pub fn param_arguments(&self, store: Option<&ParamStore>) -> Vec<String> {
        let mut out = Vec::new();
        for param in self.descriptor.parameters() {
            param.command_line(&mut out, store);
        }
        out
    }

    /// Resolve a parameter by name (see [`Descriptor::get_param`]).
    pub fn get_param(&self, name: &str) -> Result<&Parameter> {
        self.descriptor.get_param(name)
    }

    /// Mutable variant of [`get_param`](Self::get_param).
    pub fn get_param_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.descriptor.get_param_mut(name)
    }

    pub fn get_param_bool(&self, name: &str, store: Option<&ParamStore>) -> Result<bool> {
        self.descriptor.get_param(name)?.get_bool(store)
    }

    pub fn get_param_int(&self, name: &str, store: Option<&ParamStore>) -> Result<i64> {
        self.descriptor.get_param(name)?.get_int(store)
    }

    pub fn get_param_float(&self, name: &str, store: Option<&ParamStore>) -> Result<f64> {
        self.descriptor.get_param(name)?.get_float(store)
    }

    pub fn get_param_string<'a>(
        &'a self,
        name: &str,
        store: Option<&'a ParamStore>,
    ) -> Result<&'a str> {
        self.descriptor.get_param(name)?.get_string(store)
    }

    pub fn get_param_optiongroup<'a>(
        &'a self,
        name: &str,
        store: Option<&'a ParamStore>,
    ) -> Result<&'a str> {
        self.descriptor.get_param(name)?.get_optiongroup(store)
    }

    pub fn get_param_optiongroup_contains(&self, name: &str, value: &str) -> Result<bool> {
        self.descriptor.get_param(name)?.get_optiongroup_contains(value)
    }

    pub fn get_param_color(&self, name: &str, store: Option<&ParamStore>) -> Result<u32> {
        self.descriptor.get_param(name)?.get_color(store)
    }

    pub fn set_param_bool(
        &mut self,
        name: &str,
        value: bool,
        store: Option<&mut ParamStore>,
    ) -> Result<bool> {
        self.descriptor.get_param_mut(name)?.set_bool(value, store)
    }

    pub fn set_param_int(
        &mut self,
        name: &str,
        value: i64,
        store: Option<&mut ParamStore>,
    ) -> Result<i64> {
        self.descriptor.get_param_mut(name)?.set_int(value, store)
    }

    pub fn set_param_float(
        &mut self,
        name: &str,
        value: f64,
        store: Option<&mut ParamStore>,
    ) -> Result<f64> {
        self.descriptor.get_param_mut(name)?.set_float(value, store)
    }

    pub fn set_param_string(
        &mut self,
        name: &str,
        value: &str,
        store: Option<&mut ParamStore>,
    ) -> Result<()> {
        self.descriptor.get_param_mut(name)?.set_string(value, store)
    }

    pub fn set_param_optiongroup(
        &mut self,
        name: &str,
        value: &str,
        store: Option<&mut ParamStore>,
    ) -> Result<()> {
        self.descriptor
            .get_param_mut(name)?
            .set_optiongroup(value, store)
    }

    pub fn set_param_color(
        &mut self,
        name: &str,
        value: u32,
        store: Option<&mut ParamStore>,
    ) -> Result<u32> {
        self.descriptor.get_param_mut(name)?.set_color(value, store)
    }
}

impl Drop for Extension {
    /// Leave through the normal unload path so a loaded strategy always
    /// sees its `unload` before the extension goes away.
    fn drop(&mut self) {
        self.set_state(State::Unloaded);
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.descriptor.id())
            .field("name", &self.descriptor.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(xml: &str) -> Result<Extension> {
        Extension::new(InxNode::parse(xml).unwrap(), None)
    }

    #[test]
    fn test_missing_id() {
        let err = ext("<vexel-extension><name>X</name></vexel-extension>").unwrap_err();
        assert!(matches!(err, ExtensionError::MissingId));
    }

    #[test]
    fn test_empty_id() {
        let err =
            ext("<vexel-extension><id/><name>X</name></vexel-extension>").unwrap_err();
        assert!(matches!(err, ExtensionError::MissingId));
    }

    #[test]
    fn test_missing_name() {
        let err = ext("<vexel-extension><id>org.vexel.x</id></vexel-extension>").unwrap_err();
        assert!(matches!(err, ExtensionError::MissingName));
    }

    #[test]
    fn test_last_id_wins() {
        let e = ext(
            "<vexel-extension><id>first</id><id>second</id><name>X</name></vexel-extension>",
        )
        .unwrap();
        assert_eq!(e.id(), "second");
    }

    #[test]
    fn test_unknown_tags_ignored() {
        let e = ext(
            "<vexel-extension>\
               <id>org.vexel.x</id><name>X</name>\
               <effect><object-type>path</object-type></effect>\
             </vexel-extension>",
        )
        .unwrap();
        assert_eq!(e.name(), "X");
        assert!(e.descriptor().parameters().is_empty());
    }

    #[test]
    fn test_param_lookup() {
        let e = ext(
            r#"<vexel-extension>
                 <id>org.vexel.x</id><name>X</name>
                 <param name="a" type="bool">true</param>
                 <param name="b" type="int">7</param>
               </vexel-extension>"#,
        )
        .unwrap();

        assert_eq!(e.get_param_bool("a", None).unwrap(), true);
        assert_eq!(e.get_param_int("b", None).unwrap(), 7);
        assert!(matches!(
            e.get_param_bool("c", None),
            Err(ExtensionError::ParameterNotFound(_))
        ));
    }

    #[test]
    fn test_declaration_order_wins_over_depth() {
        // "x" nested in the first (composite) parameter shadows the
        // top-level "x" declared later.
        let e = ext(
            r#"<vexel-extension>
                 <id>org.vexel.x</id><name>X</name>
                 <param name="tabs" type="notebook">
                   <page name="p">
                     <param name="x" type="int">1</param>
                   </page>
                 </param>
                 <param name="x" type="int">2</param>
               </vexel-extension>"#,
        )
        .unwrap();
        assert_eq!(e.get_param_int("x", None).unwrap(), 1);
    }

    #[test]
    fn test_script_implicit_dependency_skips_comment() {
        let e = ext(
            "<vexel-extension>\
               <id>org.vexel.x</id><name>X</name>\
               <script><!-- legacy --><command>render.py</command><command>extra</command></script>\
             </vexel-extension>",
        )
        .unwrap();

        let deps = e.descriptor().dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].string(), "render.py");
    }

    #[test]
    fn test_bad_param_skipped() {
        let e = ext(
            r#"<vexel-extension>
                 <id>org.vexel.x</id><name>X</name>
                 <param name="good" type="bool">true</param>
                 <param name="bad" type="matrix">?</param>
               </vexel-extension>"#,
        )
        .unwrap();
        assert_eq!(e.descriptor().parameters().len(), 1);
    }

    #[test]
    fn test_param_arguments() {
        let e = ext(
            r#"<vexel-extension>
                 <id>org.vexel.x</id><name>X</name>
                 <param name="flat" type="bool">true</param>
                 <param name="steps" type="int">5</param>
               </vexel-extension>"#,
        )
        .unwrap();
        assert_eq!(e.param_arguments(None), vec!["--flat=true", "--steps=5"]);
    }

    #[test]
    fn test_visible_param_count() {
        let e = ext(
            r#"<vexel-extension>
                 <id>org.vexel.x</id><name>X</name>
                 <param name="a" type="bool" gui-hidden="true">true</param>
                 <param name="b" type="int">5</param>
               </vexel-extension>"#,
        )
        .unwrap();
        assert_eq!(e.visible_param_count(), 1);
    }
}
