// SPDX-License-Identifier: MIT

//! Site catalog - a small content repository loaded from YAML
//!
//! Serves as the host side of the builder: it derives the grouped sources
//! catalog from its post types and taxonomies and answers item searches
//! over its posts and terms.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::builder::DEFAULT_PAGE_SIZE;
use crate::conditions::{
    ConditionsError, Item, ItemId, ItemProvider, Source, SourceCatalog, SourceGroup,
    SourceProvider,
};

/// Items source prefix for taxonomy term lookups
pub const TAXONOMY_PREFIX: &str = "taxonomy__";

static GENERAL: Lazy<SourceGroup> = Lazy::new(|| {
    SourceGroup::new(
        "singular",
        "General",
        vec![
            Source::fixed("all_singular", "All Singular"),
            Source::fixed("front_page", "Front Page"),
            Source::fixed("404", "404 Page"),
        ],
    )
});

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostType {
    pub name: String,
    pub singular_label: String,
    pub plural_label: String,
    /// Taxonomies attached to this post type
    #[serde(default)]
    pub taxonomies: Vec<String>,
    #[serde(default = "default_true")]
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub name: String,
    pub singular_label: String,
    #[serde(default = "default_true")]
    pub public: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Publish,
    Draft,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    #[serde(rename = "type")]
    pub post_type: String,
    pub title: String,
    #[serde(default)]
    pub status: PostStatus,
    /// Term ids the post is filed under
    #[serde(default)]
    pub terms: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub taxonomy: String,
    pub name: String,
}

/// Content repository backing the reference host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteCatalog {
    #[serde(default)]
    pub post_types: Vec<PostType>,
    #[serde(default)]
    pub taxonomies: Vec<Taxonomy>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl SiteCatalog {
    /// Load a site catalog from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConditionsError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a site catalog from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, ConditionsError> {
        let site: SiteCatalog = serde_yaml::from_str(content)?;
        log::debug!(
            "Loaded site with {} post types, {} posts and {} terms",
            site.post_types.len(),
            site.posts.len(),
            site.terms.len()
        );
        Ok(site)
    }

    pub fn taxonomy(&self, name: &str) -> Option<&Taxonomy> {
        self.taxonomies.iter().find(|t| t.name == name)
    }

    pub fn post(&self, id: u64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Build the grouped sources catalog: the general group, then one group
    /// per public post type with its public taxonomies.
    pub fn sources(&self) -> SourceCatalog {
        let mut groups = vec![GENERAL.clone()];

        for post_type in self.post_types.iter().filter(|t| t.public) {
            let mut children = vec![
                Source::fixed(
                    format!("{}__all", post_type.name),
                    format!("All {}", post_type.plural_label),
                ),
                Source::searchable(
                    format!("{}__specific", post_type.name),
                    format!("Specific {}", post_type.singular_label),
                    post_type.name.clone(),
                ),
            ];

            for name in &post_type.taxonomies {
                let Some(taxonomy) = self.taxonomy(name).filter(|t| t.public) else {
                    continue;
                };
                children.push(Source::searchable(
                    format!("{}__tax_{}", post_type.name, taxonomy.name),
                    format!("In {}", taxonomy.singular_label),
                    format!("{}{}", TAXONOMY_PREFIX, taxonomy.name),
                ));
            }

            groups.push(SourceGroup::new(
                post_type.name.clone(),
                post_type.singular_label.clone(),
                children,
            ));
        }

        SourceCatalog::new(groups)
    }

    /// Items of `source` whose label contains `search`, case-insensitively.
    /// `taxonomy__{name}` lists terms, anything else published posts of that type.
    pub fn items(&self, source: &str, search: &str) -> Vec<Item> {
        let needle = search.trim().to_lowercase();
        let hit = |label: &str| needle.is_empty() || label.to_lowercase().contains(&needle);

        let items: Vec<Item> = match source.strip_prefix(TAXONOMY_PREFIX) {
            Some(taxonomy) => self
                .terms
                .iter()
                .filter(|t| t.taxonomy == taxonomy && hit(&t.name))
                .map(|t| Item::new(t.id, t.name.clone()))
                .collect(),
            None => self
                .posts
                .iter()
                .filter(|p| p.post_type == source && p.status == PostStatus::Publish)
                .filter(|p| hit(&p.title))
                .map(|p| Item::new(p.id, p.title.clone()))
                .collect(),
        };

        items.into_iter().take(DEFAULT_PAGE_SIZE).collect()
    }

    /// Exact lookup of saved identifiers, in the order given
    pub fn lookup(&self, source: &str, ids: &[ItemId]) -> Vec<Item> {
        let candidates: Vec<Item> = match source.strip_prefix(TAXONOMY_PREFIX) {
            Some(taxonomy) => self
                .terms
                .iter()
                .filter(|t| t.taxonomy == taxonomy)
                .map(|t| Item::new(t.id, t.name.clone()))
                .collect(),
            None => self
                .posts
                .iter()
                .filter(|p| p.post_type == source)
                .map(|p| Item::new(p.id, p.title.clone()))
                .collect(),
        };

        ids.iter()
            .filter_map(|id| candidates.iter().find(|c| &c.id == id).cloned())
            .collect()
    }
}

#[async_trait]
impl SourceProvider for SiteCatalog {
    async fn list_sources(&self) -> Result<SourceCatalog, ConditionsError> {
        Ok(self.sources())
    }
}

#[async_trait]
impl ItemProvider for SiteCatalog {
    async fn list_items(&self, source: &str, query: &str) -> Result<Vec<Item>, ConditionsError> {
        Ok(self.items(source, query))
    }

    async fn resolve_items(
        &self,
        source: &str,
        ids: &[ItemId],
    ) -> Result<Vec<Item>, ConditionsError> {
        Ok(self.lookup(source, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
post_types:
  - name: post
    singular_label: Post
    plural_label: Posts
    taxonomies: [category, post_tag, internal]
  - name: page
    singular_label: Page
    plural_label: Pages
  - name: revision
    singular_label: Revision
    plural_label: Revisions
    public: false
taxonomies:
  - name: category
    singular_label: Category
  - name: post_tag
    singular_label: Tag
  - name: internal
    singular_label: Internal
    public: false
posts:
  - id: 10
    type: post
    title: Hello World
    terms: [5]
  - id: 11
    type: post
    title: Draft Thoughts
    status: draft
  - id: 12
    type: post
    title: Another hello
  - id: 20
    type: page
    title: About
terms:
  - id: 5
    taxonomy: category
    name: News
  - id: 6
    taxonomy: category
    name: Reviews
  - id: 7
    taxonomy: post_tag
    name: rust
"#;

    fn site() -> SiteCatalog {
        SiteCatalog::parse_yaml(SITE).unwrap()
    }

    #[test]
    fn test_sources_layout() {
        let catalog = site().sources();
        let keys: Vec<&str> = catalog.groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["singular", "post", "page"]);

        let post: Vec<&str> = catalog.groups()[1]
            .children
            .iter()
            .map(|s| s.key.as_str())
            .collect();
        assert_eq!(
            post,
            vec!["post__all", "post__specific", "post__tax_category", "post__tax_post_tag"]
        );

        let all = catalog.find("post__all").unwrap();
        assert!(!all.searchable);
        assert_eq!(all.label, "All Posts");

        let tag = catalog.find("post__tax_post_tag").unwrap();
        assert!(tag.searchable);
        assert_eq!(tag.items_key(), "taxonomy__post_tag");
        assert_eq!(tag.label, "In Tag");

        assert_eq!(catalog.find("page__specific").unwrap().items_key(), "page");
        assert!(catalog.find("revision__all").is_none());
    }

    #[test]
    fn test_general_group() {
        let catalog = SiteCatalog::default().sources();
        assert_eq!(catalog.groups().len(), 1);
        assert_eq!(catalog.group_label("404"), Some("General"));
        assert!(catalog.sources().all(|s| !s.searchable));
    }

    #[test]
    fn test_post_items_exclude_drafts_and_filter() {
        let site = site();
        let all = site.items("post", "");
        assert_eq!(all.len(), 2);

        let hello = site.items("post", "HELLO");
        let ids: Vec<&str> = hello.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "12"]);

        assert!(site.items("post", "draft").is_empty());
        assert!(site.items("unknown", "").is_empty());
    }

    #[test]
    fn test_taxonomy_items() {
        let site = site();
        let terms = site.items("taxonomy__category", "rev");
        assert_eq!(terms, vec![Item::new(6u64, "Reviews")]);
        assert_eq!(site.items("taxonomy__category", "").len(), 2);
    }

    #[test]
    fn test_items_page_cap() {
        let mut site = SiteCatalog::default();
        site.posts = (0..30)
            .map(|id| Post {
                id,
                post_type: "post".into(),
                title: format!("Post {}", id),
                status: PostStatus::Publish,
                terms: vec![],
            })
            .collect();
        assert_eq!(site.items("post", "").len(), DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_resolve_is_exact() {
        let site = site();
        let found = site
            .resolve_items("post", &[ItemId::from("12"), ItemId::from("99"), ItemId::from("11")])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["12", "11"]);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = SiteCatalog::parse_yaml("post_types: 3").unwrap_err();
        assert!(matches!(err, ConditionsError::Yaml(_)));
    }
}
