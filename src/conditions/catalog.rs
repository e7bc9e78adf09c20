// SPDX-License-Identifier: MIT

//! Catalog types and the provider capabilities a host supplies
//!
//! The sources catalog travels as an insertion-ordered JSON object keyed by
//! group, each group holding a label and its child sources.

use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::condition::ItemId;
use super::error::ConditionsError;

/// A category of context one can condition on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub key: String,
    pub label: String,
    /// Whether the source has enumerable items
    #[serde(default)]
    pub searchable: bool,
    /// Identifier used to fetch items when it differs from `key`
    #[serde(default, rename = "source", skip_serializing_if = "Option::is_none")]
    pub items_source: Option<String>,
}

impl Source {
    /// A source with an implicit, fixed item set
    pub fn fixed(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            searchable: false,
            items_source: None,
        }
    }

    /// A source whose items are fetched from `items_source`
    pub fn searchable(
        key: impl Into<String>,
        label: impl Into<String>,
        items_source: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            searchable: true,
            items_source: Some(items_source.into()),
        }
    }

    /// The identifier to send when listing items
    pub fn items_key(&self) -> &str {
        self.items_source.as_deref().unwrap_or(&self.key)
    }
}

/// A labelled group of sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    #[serde(skip)]
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub children: Vec<Source>,
}

impl SourceGroup {
    pub fn new(key: impl Into<String>, label: impl Into<String>, children: Vec<Source>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            children,
        }
    }
}

/// Grouped catalog of sources, in the order the host supplied them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCatalog {
    groups: Vec<SourceGroup>,
}

impl SourceCatalog {
    pub fn new(groups: Vec<SourceGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[SourceGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.children.is_empty())
    }

    /// Find a source by key across all groups
    pub fn find(&self, key: &str) -> Option<&Source> {
        self.groups
            .iter()
            .flat_map(|g| g.children.iter())
            .find(|s| s.key == key)
    }

    /// Label of the group holding `key`
    pub fn group_label(&self, key: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.children.iter().any(|s| s.key == key))
            .map(|g| g.label.as_str())
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.groups.iter().flat_map(|g| g.children.iter())
    }
}

impl Serialize for SourceCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.key, group)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SourceCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = SourceCatalog;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of source groups")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut groups = Vec::new();
                while let Some((key, mut group)) = access.next_entry::<String, SourceGroup>()? {
                    group.key = key;
                    groups.push(group);
                }
                Ok(SourceCatalog { groups })
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

/// One selectable entity inside a searchable source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub label: String,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Supplies the grouped sources catalog
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn list_sources(&self) -> Result<SourceCatalog, ConditionsError>;
}

/// Supplies items for searchable sources
#[async_trait]
pub trait ItemProvider: Send + Sync {
    /// Return one page of items of `source` matching `query`.
    /// An empty query lists the most relevant items first.
    async fn list_items(&self, source: &str, query: &str) -> Result<Vec<Item>, ConditionsError>;

    /// Look up saved identifiers. The default scans the unfiltered page.
    async fn resolve_items(
        &self,
        source: &str,
        ids: &[ItemId],
    ) -> Result<Vec<Item>, ConditionsError> {
        let page = self.list_items(source, "").await?;
        Ok(page.into_iter().filter(|i| ids.contains(&i.id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article_catalog() -> serde_json::Value {
        json!({
            "content": {
                "label": "Content",
                "children": [
                    {"key": "article__all", "label": "All Articles", "searchable": false},
                    {"key": "article__specific", "label": "Specific Article", "searchable": true, "source": "article"}
                ]
            },
            "general": {
                "label": "General",
                "children": [{"key": "front_page", "label": "Front Page"}]
            }
        })
    }

    #[test]
    fn test_catalog_deserialize_keeps_group_order() {
        let catalog: SourceCatalog = serde_json::from_value(article_catalog()).unwrap();
        let keys: Vec<&str> = catalog.groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["content", "general"]);
        assert_eq!(catalog.group_label("front_page"), Some("General"));
    }

    #[test]
    fn test_find_and_items_key() {
        let catalog: SourceCatalog = serde_json::from_value(article_catalog()).unwrap();

        let specific = catalog.find("article__specific").unwrap();
        assert!(specific.searchable);
        assert_eq!(specific.items_key(), "article");

        let front = catalog.find("front_page").unwrap();
        assert!(!front.searchable);
        assert_eq!(front.items_key(), "front_page");

        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn test_catalog_serialize_shape() {
        let catalog = SourceCatalog::new(vec![SourceGroup::new(
            "content",
            "Content",
            vec![Source::searchable("article__specific", "Specific Article", "article")],
        )]);
        assert_eq!(
            serde_json::to_value(&catalog).unwrap(),
            json!({
                "content": {
                    "label": "Content",
                    "children": [
                        {"key": "article__specific", "label": "Specific Article", "searchable": true, "source": "article"}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_empty_catalog() {
        let catalog: SourceCatalog = serde_json::from_value(json!({})).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.sources().count(), 0);
    }

    #[test]
    fn test_item_accepts_numeric_id() {
        let item: Item = serde_json::from_value(json!({"id": 42, "label": "Hello"})).unwrap();
        assert_eq!(item.id, ItemId::from("42"));
    }

    struct PageProvider;

    #[async_trait]
    impl ItemProvider for PageProvider {
        async fn list_items(
            &self,
            _source: &str,
            _query: &str,
        ) -> Result<Vec<Item>, ConditionsError> {
            Ok(vec![Item::new("1", "One"), Item::new("2", "Two")])
        }
    }

    #[tokio::test]
    async fn test_default_resolve_filters_page() {
        let found = PageProvider
            .resolve_items("post", &[ItemId::from("2"), ItemId::from("9")])
            .await
            .unwrap();
        assert_eq!(found, vec![Item::new("2", "Two")]);
    }
}
