use crate::error::Result;
use crate::model::{Relation, Tuple};
use std::fmt;
use std::sync::Arc;

/// A named query the target relation knows how to perform for an
/// association: given the source's materialized tuples, return a new target
/// relation scoped to them (typically by deriving key params for its own
/// fetch). All association I/O intent lives behind this seam.
#[async_trait::async_trait]
pub trait RelationView: Send + Sync {
    async fn call(&self, source: &[Tuple], target: Relation) -> Result<Relation>;
}

/// Shared definition for the single-join association kinds.
#[derive(Clone)]
pub struct AssociationDef {
    name: String,
    view: Option<Arc<dyn RelationView>>,
    /// Override for the foreign-key field; defaults to `<source>_id` by
    /// naming convention.
    foreign_key: Option<String>,
    /// Override for the target-side primary key; defaults to the target
    /// relation's primary key.
    target_primary_key: Option<String>,
}

impl AssociationDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: None,
            foreign_key: None,
            target_primary_key: None,
        }
    }

    pub fn with_view(mut self, view: Arc<dyn RelationView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn with_target_primary_key(mut self, key: impl Into<String>) -> Self {
        self.target_primary_key = Some(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> Option<&Arc<dyn RelationView>> {
        self.view.as_ref()
    }

    pub fn foreign_key(&self, source: &Relation) -> String {
        self.foreign_key
            .clone()
            .unwrap_or_else(|| conventional_foreign_key(source.name()))
    }

    pub fn target_primary_key(&self, target: &Relation) -> String {
        self.target_primary_key
            .clone()
            .unwrap_or_else(|| target.primary_key().to_string())
    }
}

impl fmt::Debug for AssociationDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationDef")
            .field("name", &self.name)
            .field("view", &self.view.is_some())
            .field("foreign_key", &self.foreign_key)
            .field("target_primary_key", &self.target_primary_key)
            .finish()
    }
}

/// ManyToMany definition: the extra keys name the two foreign-key columns
/// of the join-table relation.
#[derive(Clone)]
pub struct ManyToManyDef {
    name: String,
    view: Option<Arc<dyn RelationView>>,
    /// The join-table relation the source/target rows are matched through.
    through: Option<Relation>,
    /// Scopes the join-table fetch by the source set. When absent, the
    /// join-table relation is materialized as-is.
    through_view: Option<Arc<dyn RelationView>>,
    source_foreign_key: Option<String>,
    target_foreign_key: Option<String>,
    target_primary_key: Option<String>,
}

impl ManyToManyDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: None,
            through: None,
            through_view: None,
            source_foreign_key: None,
            target_foreign_key: None,
            target_primary_key: None,
        }
    }

    pub fn with_through(mut self, through: Relation) -> Self {
        self.through = Some(through);
        self
    }

    pub fn with_view(mut self, view: Arc<dyn RelationView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_through_view(mut self, view: Arc<dyn RelationView>) -> Self {
        self.through_view = Some(view);
        self
    }

    pub fn with_source_foreign_key(mut self, key: impl Into<String>) -> Self {
        self.source_foreign_key = Some(key.into());
        self
    }

    pub fn with_target_foreign_key(mut self, key: impl Into<String>) -> Self {
        self.target_foreign_key = Some(key.into());
        self
    }

    pub fn with_target_primary_key(mut self, key: impl Into<String>) -> Self {
        self.target_primary_key = Some(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> Option<&Arc<dyn RelationView>> {
        self.view.as_ref()
    }

    pub fn through(&self) -> Option<&Relation> {
        self.through.as_ref()
    }

    pub fn through_view(&self) -> Option<&Arc<dyn RelationView>> {
        self.through_view.as_ref()
    }

    pub fn source_foreign_key(&self, source: &Relation) -> String {
        self.source_foreign_key
            .clone()
            .unwrap_or_else(|| conventional_foreign_key(source.name()))
    }

    pub fn target_foreign_key(&self, target: &Relation) -> String {
        self.target_foreign_key
            .clone()
            .unwrap_or_else(|| conventional_foreign_key(target.name()))
    }

    pub fn target_primary_key(&self, target: &Relation) -> String {
        self.target_primary_key
            .clone()
            .unwrap_or_else(|| target.primary_key().to_string())
    }
}

impl fmt::Debug for ManyToManyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyToManyDef")
            .field("name", &self.name)
            .field("view", &self.view.is_some())
            .field("through", &self.through.as_ref().map(Relation::name))
            .field("through_view", &self.through_view.is_some())
            .field("source_foreign_key", &self.source_foreign_key)
            .field("target_foreign_key", &self.target_foreign_key)
            .finish()
    }
}

/// A declared relationship between two relations, resolved by in-memory
/// join after independent fetches.
#[derive(Debug, Clone)]
pub enum Association {
    OneToMany(AssociationDef),
    OneToOne(AssociationDef),
    ManyToOne(AssociationDef),
    ManyToMany(ManyToManyDef),
}

impl Association {
    pub fn name(&self) -> &str {
        match self {
            Association::OneToMany(def)
            | Association::OneToOne(def)
            | Association::ManyToOne(def) => def.name(),
            Association::ManyToMany(def) => def.name(),
        }
    }

    pub fn view(&self) -> Option<&Arc<dyn RelationView>> {
        match self {
            Association::OneToMany(def)
            | Association::OneToOne(def)
            | Association::ManyToOne(def) => def.view(),
            Association::ManyToMany(def) => def.view(),
        }
    }
}

/// `users` → `user_id`, `categories` → `category_id`. Deliberately naive;
/// callers with irregular nouns set the key explicitly.
pub fn conventional_foreign_key(source_name: &str) -> String {
    let singular = if let Some(stem) = source_name.strip_suffix("ies") {
        format!("{stem}y")
    } else {
        source_name.strip_suffix('s').unwrap_or(source_name).to_string()
    };
    format!("{singular}_id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_foreign_key() {
        assert_eq!(conventional_foreign_key("users"), "user_id");
        assert_eq!(conventional_foreign_key("categories"), "category_id");
        assert_eq!(conventional_foreign_key("staff"), "staff_id");
    }

    #[test]
    fn test_association_def_defaults() {
        let def = AssociationDef::new("posts");
        assert_eq!(def.name(), "posts");
        assert!(def.view().is_none());
    }
}
