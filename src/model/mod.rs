pub mod association;
pub mod dataset;
pub mod relation;
pub mod schema;
pub mod transformer;
pub mod tuple;

pub use association::{
    conventional_foreign_key, Association, AssociationDef, ManyToManyDef, RelationView,
};
pub use dataset::{Dataset, RequestMethod};
pub use relation::Relation;
pub use schema::{AttrType, Attribute, Schema};
pub use transformer::{Step, Transformer};
pub use tuple::{deep_merge, params_from, Params, Tuple};
