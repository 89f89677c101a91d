//! Query remote HTTP collections like relational tables.
//!
//! The building blocks are an immutable request descriptor ([`Dataset`])
//! that accumulates query intent without performing I/O, a declarative
//! [`Schema`] that coerces and reshapes raw JSON tuples, and association
//! resolvers that join two independently fetched collections in memory.
//!
//! ```no_run
//! use restset::{Attribute, AttrType, Gateway, GatewayConfig, Relation, Schema};
//!
//! # async fn demo() -> restset::Result<()> {
//! let gateway = Gateway::new(GatewayConfig::json("https://api.example.com"))?;
//!
//! let users = Relation::with_schema(
//!     "users",
//!     gateway.dataset("users"),
//!     Schema::new(vec![
//!         Attribute::new("id", AttrType::Integer).primary(),
//!         Attribute::new("name", AttrType::String),
//!     ]),
//! );
//!
//! let tuples = users.with_query_params(
//!     restset::params_from(serde_json::json!({"active": true})),
//! ).to_a().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod logic;
pub mod model;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use handlers::{
    JsonRequestHandler, JsonResponseHandler, RawResponse, RequestHandler, ResponseHandler,
};
pub use logic::{combine, Create, Delete, ResponseTransformer, Update};
pub use model::{
    deep_merge, params_from, Association, AssociationDef, AttrType, Attribute, Dataset,
    ManyToManyDef, Params, Relation, RelationView, RequestMethod, Schema, Transformer, Tuple,
};
