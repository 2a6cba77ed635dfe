use super::write_atomically;
use crate::core::error::{Error, IoContext, Result};
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::borrow::Cow;
use std::path::Path;

/// Generic YAML tree that keeps key order and the original scalar kinds.
///
/// An integer stays an integer and a quoted number stays a string when written back, so
/// untouched fields keep their on-disk shape. A plain number whose text would not survive
/// a save, such as `versionName: 2.10`, is read as the string `2.10`. A leading global tag line such as
/// `!!brut.androlib.meta.MetaInfo` is carried through verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct YamlDocument {
    header: Option<String>,
    root: Value,
}

impl YamlDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("Reading `{}`", path.display()))?;
        Self::parse(&content).map_err(|reason| Error::MalformedYaml {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let (header, body) = split_header(content);
        let body = quote_lossy_numbers(body);
        let root: Value = serde_yaml::from_str(&body).map_err(|err| err.to_string())?;
        let root = match root {
            Value::Null => Value::Mapping(Mapping::new()),
            Value::Mapping(_) => root,
            _ => return Err("top level must be a mapping".to_string()),
        };
        Ok(Self {
            header: header.map(str::to_string),
            root,
        })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.root, |node, key| node.get(*key))
    }

    /// Writes `value` at `path`, creating missing parent mappings along the way.
    ///
    /// A non-mapping node found on the way is replaced by an empty mapping.
    pub fn set(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut node = &mut self.root;
        for key in parents {
            let mapping = as_mapping(node);
            node = mapping
                .entry(Value::String(key.to_string()))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
        }
        as_mapping(node).insert(Value::String(last.to_string()), value);
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        let body = serde_yaml::to_string(&self.root)?;
        Ok(match &self.header {
            Some(header) => format!("{}\n{}", header, body),
            None => body,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_yaml_string().map_err(|err| Error::MalformedYaml {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        write_atomically(path, content.as_bytes())
    }
}

fn as_mapping(node: &mut Value) -> &mut Mapping {
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    match node {
        Value::Mapping(mapping) => mapping,
        _ => unreachable!("node was just replaced by a mapping"),
    }
}

fn split_header(content: &str) -> (Option<&str>, &str) {
    let trimmed = content.trim_start_matches('\u{feff}');
    let first_line = trimmed.lines().next().unwrap_or_default();
    if first_line.starts_with("!!") && !first_line.contains(':') {
        let body = &trimmed[first_line.len()..];
        (Some(first_line.trim_end()), body)
    } else {
        (None, trimmed)
    }
}

/// Quotes plain scalars that parse as numbers but print back differently: `2.10` would
/// become `2.1` and `0x1F` would become `31`.
fn quote_lossy_numbers(body: &str) -> Cow<'_, str> {
    let Ok(pattern) = Regex::new(
        r#"(?m)^([ \t]*(?:-[ \t]+)?(?:[^\s#'"\-:][^:#\n]*:[ \t]+)?)([-+.0-9][^\s#,\[\]{}]*)[ \t]*$"#,
    ) else {
        return Cow::Borrowed(body);
    };
    pattern.replace_all(body, |caps: &Captures| {
        let scalar = &caps[2];
        match serde_yaml::from_str::<Value>(scalar) {
            Ok(number @ Value::Number(_)) if scalar_string(&number).as_deref() != Some(scalar) => {
                format!("{}'{}'", &caps[1], scalar)
            }
            _ => caps[0].to_string(),
        }
    })
}

/// Scalar rendered as text: strings as-is, numbers and booleans in their decimal form.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}
