pub mod combine;
pub mod commands;
pub mod transform;

pub use combine::{
    combine, join_many_to_many, join_many_to_one, join_one_to_many, join_one_to_one,
};
pub use commands::{Create, Delete, Update};
pub use transform::ResponseTransformer;
