// SPDX-License-Identifier: MIT

//! Page context - what the current request is, for evaluating conditions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::conditions::{ConditionsError, ContextMatcher, ItemId};

/// A single post being viewed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularPage {
    pub post_type: String,
    pub id: ItemId,
    /// Term ids per taxonomy
    #[serde(default)]
    pub terms: BTreeMap<String, Vec<ItemId>>,
}

/// The request conditions are evaluated against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default)]
    pub front_page: bool,
    #[serde(default)]
    pub not_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singular: Option<SingularPage>,
}

impl PageContext {
    pub fn front_page() -> Self {
        Self {
            front_page: true,
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }

    pub fn singular(post_type: impl Into<String>, id: impl Into<ItemId>) -> Self {
        Self {
            singular: Some(SingularPage {
                post_type: post_type.into(),
                id: id.into(),
                terms: BTreeMap::new(),
            }),
            ..Self::default()
        }
    }

    /// Attach terms of `taxonomy` to a singular context
    pub fn with_terms<I, T>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        if let Some(page) = self.singular.as_mut() {
            page.terms
                .insert(taxonomy.into(), terms.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Load a context from a YAML or JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConditionsError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a context from YAML or JSON
    pub fn parse(content: &str) -> Result<Self, ConditionsError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn singular_of(&self, post_type: &str) -> Option<&SingularPage> {
        self.singular.as_ref().filter(|p| p.post_type == post_type)
    }
}

impl ContextMatcher for PageContext {
    fn matches(&self, source: &str, items: &[ItemId]) -> bool {
        match source {
            "all_singular" => return self.singular.is_some(),
            "front_page" => return self.front_page,
            "404" => return self.not_found,
            _ => {}
        }

        let Some((post_type, rest)) = source.split_once("__") else {
            log::debug!("Unknown source '{}' never matches", source);
            return false;
        };
        let Some(page) = self.singular_of(post_type) else {
            return false;
        };

        if rest == "all" {
            return true;
        }
        if rest == "specific" {
            return items.is_empty() || items.contains(&page.id);
        }
        if let Some(taxonomy) = rest.strip_prefix("tax_") {
            let terms = page.terms.get(taxonomy).map(Vec::as_slice).unwrap_or_default();
            if items.is_empty() {
                return !terms.is_empty();
            }
            return terms.iter().any(|t| items.contains(t));
        }

        log::debug!("Unknown source '{}' never matches", source);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{ConditionList, ConditionRow};

    fn ids(items: &[&str]) -> Vec<ItemId> {
        items.iter().map(|s| ItemId::from(*s)).collect()
    }

    #[test]
    fn test_general_sources() {
        let front = PageContext::front_page();
        assert!(front.matches("front_page", &[]));
        assert!(!front.matches("404", &[]));
        assert!(!front.matches("all_singular", &[]));

        let missing = PageContext::not_found();
        assert!(missing.matches("404", &[]));

        let post = PageContext::singular("post", 10u64);
        assert!(post.matches("all_singular", &[]));
    }

    #[test]
    fn test_post_type_sources() {
        let post = PageContext::singular("post", 10u64);
        assert!(post.matches("post__all", &[]));
        assert!(!post.matches("page__all", &[]));
        assert!(post.matches("post__specific", &ids(&["3", "10"])));
        assert!(!post.matches("post__specific", &ids(&["3"])));
        assert!(post.matches("post__specific", &[]));
    }

    #[test]
    fn test_taxonomy_sources() {
        let post = PageContext::singular("post", 10u64).with_terms("category", [5u64, 6]);
        assert!(post.matches("post__tax_category", &ids(&["6"])));
        assert!(!post.matches("post__tax_category", &ids(&["7"])));
        assert!(post.matches("post__tax_category", &[]));
        assert!(!post.matches("post__tax_post_tag", &[]));
        assert!(!post.matches("page__tax_category", &ids(&["5"])));
    }

    #[test]
    fn test_unknown_sources_never_match() {
        let post = PageContext::singular("post", 10u64);
        assert!(!post.matches("post__weird", &[]));
        assert!(!post.matches("nonsense", &[]));
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = r#"
singular:
  post_type: post
  id: 10
  terms:
    category: [5, "6"]
"#;
        let ctx = PageContext::parse(yaml).unwrap();
        assert!(ctx.matches("post__tax_category", &ids(&["6"])));
        assert!(!ctx.front_page);

        let json = r#"{"front_page": true}"#;
        assert_eq!(PageContext::parse(json).unwrap(), PageContext::front_page());
    }

    #[test]
    fn test_evaluates_condition_list() {
        let conditions = ConditionList::new(vec![
            ConditionRow::exclude("post__tax_category").with_items(["5"]),
            ConditionRow::include("post__all"),
        ]);

        let news = PageContext::singular("post", 1u64).with_terms("category", [5u64]);
        let other = PageContext::singular("post", 2u64).with_terms("category", [6u64]);
        assert!(!conditions.evaluate(&news));
        assert!(conditions.evaluate(&other));
        assert!(!conditions.evaluate(&PageContext::front_page()));
    }
}
