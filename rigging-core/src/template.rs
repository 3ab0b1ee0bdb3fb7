use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::ViewError;

/// Either inline markup or the name of a registered template source.
#[derive(Clone, Debug)]
pub enum Template {
    Inline(Rc<str>),
    Named(String),
}

impl Template {
    pub fn inline(source: &str) -> Template {
        Template::Inline(source.into())
    }

    pub fn named(name: &str) -> Template {
        Template::Named(name.to_owned())
    }
}

/// A shared name-to-source map. Sharing it process-wide is the
/// application's choice of handing out one `Rc`.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    sources: RefCell<HashMap<String, Rc<str>>>,
}

impl TemplateRegistry {
    pub fn new() -> TemplateRegistry {
        Self::default()
    }

    pub fn register(&self, name: &str, source: &str) {
        self.sources
            .borrow_mut()
            .insert(name.to_owned(), source.into());
    }

    pub fn resolve(&self, name: &str) -> Option<Rc<str>> {
        self.sources.borrow().get(name).cloned()
    }

    pub fn clear(&self) {
        self.sources.borrow_mut().clear();
    }
}

/// Pure, synchronous template rendering. `{{key}}` placeholders substitute
/// the record attribute of that name; missing keys render empty.
#[derive(Clone)]
pub struct Renderer {
    registry: Rc<TemplateRegistry>,
}

impl Renderer {
    pub fn new(registry: Rc<TemplateRegistry>) -> Renderer {
        Renderer { registry }
    }

    pub fn registry(&self) -> &Rc<TemplateRegistry> {
        &self.registry
    }

    pub fn render(
        &self,
        template: &Template,
        data: &BTreeMap<String, String>,
    ) -> Result<String, ViewError> {
        let source = match template {
            Template::Inline(source) => source.clone(),
            Template::Named(name) => self
                .registry
                .resolve(name)
                .ok_or_else(|| ViewError::TemplateNotFound(name.clone()))?,
        };
        Ok(substitute(&source, data))
    }
}

fn substitute(source: &str, data: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim();
                if let Some(value) = data.get(key) {
                    output.push_str(value);
                }
                rest = &after_open[close + 2..];
            }
            None => {
                // Unterminated placeholder; emit the remainder verbatim.
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}
