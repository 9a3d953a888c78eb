use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// A contingency list file.
///
/// ```yaml
/// version: 1
/// contingencies:
///   - id: N-1_L1
///     elements:
///       - type: branch
///         id: L1
///   - id: N-2_G1_L2
///     elements:
///       - { type: generator, id: G1 }
///       - { type: branch, id: L2 }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContingencyList {
    pub version: Option<u32>,
    #[serde(default)]
    pub contingencies: Vec<Contingency>,
}

/// A named loss of one or more network elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contingency {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub elements: Vec<ContingencyElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContingencyElement {
    Branch { id: String },
    Generator { id: String },
    Load { id: String },
    ThreeWindingsTransformer { id: String },
    HvdcLine { id: String },
    /// Opens everything connected to the bus
    Bus { id: String },
}

impl ContingencyElement {
    pub fn id(&self) -> &str {
        match self {
            ContingencyElement::Branch { id }
            | ContingencyElement::Generator { id }
            | ContingencyElement::Load { id }
            | ContingencyElement::ThreeWindingsTransformer { id }
            | ContingencyElement::HvdcLine { id }
            | ContingencyElement::Bus { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContingencyElement::Branch { .. } => "branch",
            ContingencyElement::Generator { .. } => "generator",
            ContingencyElement::Load { .. } => "load",
            ContingencyElement::ThreeWindingsTransformer { .. } => "three-winding transformer",
            ContingencyElement::HvdcLine { .. } => "HVDC line",
            ContingencyElement::Bus { .. } => "bus",
        }
    }
}

impl Contingency {
    pub fn new(id: impl Into<String>, elements: Vec<ContingencyElement>) -> Self {
        Self {
            id: id.into(),
            name: None,
            elements,
        }
    }

    /// Single-branch contingency.
    pub fn branch(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), vec![ContingencyElement::Branch { id }])
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

pub fn load_contingency_list(path: &Path) -> Result<ContingencyList> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading contingency list '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing contingency list yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing contingency list json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing contingency list"),
    }
}

pub fn save_contingency_list(path: &Path, list: &ContingencyList) -> Result<()> {
    let data = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::to_string_pretty(list).context("serializing contingency list json")?
        }
        _ => serde_yaml::to_string(list).context("serializing contingency list yaml")?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    fs::write(path, data)
        .with_context(|| format!("writing contingency list '{}'", path.display()))
}

/// Check ids and element lists, returning the contingencies in file order.
pub fn resolve_contingencies(list: &ContingencyList) -> Result<Vec<Contingency>> {
    let mut seen = HashSet::new();
    for contingency in &list.contingencies {
        if contingency.id.trim().is_empty() {
            return Err(anyhow!("contingency id cannot be empty"));
        }
        if !seen.insert(contingency.id.as_str()) {
            return Err(anyhow!(
                "duplicate contingency id '{}' in list",
                contingency.id
            ));
        }
        if contingency.elements.is_empty() {
            return Err(anyhow!(
                "contingency '{}' must declare at least one element",
                contingency.id
            ));
        }
    }
    debug!(count = list.contingencies.len(), "contingency list resolved");
    Ok(list.contingencies.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_elements_are_tagged_by_type() {
        let yaml = r#"
contingencies:
  - id: C1
    elements:
      - type: branch
        id: L1
      - type: three_windings_transformer
        id: T3
"#;
        let list: ContingencyList = serde_yaml::from_str(yaml).unwrap();
        let resolved = resolve_contingencies(&list).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            resolved[0].elements,
            vec![
                ContingencyElement::Branch { id: "L1".into() },
                ContingencyElement::ThreeWindingsTransformer { id: "T3".into() },
            ]
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let list = ContingencyList {
            version: None,
            contingencies: vec![Contingency::branch("L1"), Contingency::branch("L1")],
        };
        let err = resolve_contingencies(&list).unwrap_err();
        assert!(err.to_string().contains("duplicate contingency id 'L1'"));
    }

    #[test]
    fn empty_element_lists_are_rejected() {
        let list = ContingencyList {
            version: Some(1),
            contingencies: vec![Contingency::new("EMPTY", Vec::new())],
        };
        assert!(resolve_contingencies(&list).is_err());
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(resolve_contingencies(&ContingencyList::default())
            .unwrap()
            .is_empty());
    }
}
