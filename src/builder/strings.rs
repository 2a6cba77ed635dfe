use crate::core::error::Result;
use crate::store::{Element, XmlDocument};
use std::path::Path;

pub const APP_NAME: &str = "app_name";

/// Edits `<string name="…">` entries of `res/values/strings.xml`.
#[derive(Clone, Debug)]
pub struct StringsBuilder {
    doc: XmlDocument,
}

impl StringsBuilder {
    pub fn new(doc: XmlDocument) -> Self {
        Self { doc }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(XmlDocument::load(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.doc.save(path)
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    fn entry(&self, name: &str) -> Option<&Element> {
        self.doc
            .root()
            .elements("string")
            .find(|string| string.attribute("name") == Some(name))
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.entry(name).map(Element::text)
    }

    /// Sets the text of the first `<string>` named `name`; absent entries are left alone.
    pub fn replace(&mut self, name: &str, value: &str) -> &mut Self {
        let string = self
            .doc
            .root_mut()
            .elements_mut("string")
            .find(|string| string.attribute("name") == Some(name));
        match string {
            Some(string) => string.set_text(value),
            None => log::debug!("no <string name=\"{}\">, skipped", name),
        }
        self
    }

    pub fn replace_display_name(&mut self, display_name: &str) -> &mut Self {
        self.replace(APP_NAME, display_name)
    }
}
