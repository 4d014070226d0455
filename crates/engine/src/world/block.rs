use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Namespace assumed for block names written without one (`stone` ->
/// `minecraft:stone`).
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// One palette entry: a namespaced block type plus its state properties.
///
/// The engine never interprets the name beyond exact comparison. The only
/// property it reads is `axis` (see `cluster::Orientation`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl BlockDescriptor {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Lowercase, trim, and add the default namespace when missing.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    if name.contains(':') {
        name
    } else {
        format!("{DEFAULT_NAMESPACE}:{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_get_default_namespace() {
        assert_eq!(normalize_name("stone"), "minecraft:stone");
        assert_eq!(normalize_name(" Nether_Portal "), "minecraft:nether_portal");
        assert_eq!(normalize_name("create:brass_block"), "create:brass_block");
    }

    #[test]
    fn descriptor_properties() {
        let portal = BlockDescriptor::new("nether_portal").with_property("axis", "z");
        assert_eq!(portal.name, "minecraft:nether_portal");
        assert_eq!(portal.property("axis"), Some("z"));
        assert_eq!(portal.property("facing"), None);
    }
}
