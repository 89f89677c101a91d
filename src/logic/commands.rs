//! Create/Update/Delete commands over a relation.
//!
//! Batches are arity-preserving: N inputs produce N outputs in input order,
//! one request per tuple, sequentially. The failure policy is fail-fast: the
//! first tuple that fails validation aborts the batch with a
//! [`Error::TupleValidation`] naming its index. Requests already sent are
//! not rolled back.

use crate::error::{Error, Result};
use crate::model::{Relation, Tuple};

fn require_schema(relation: &Relation) -> Result<()> {
    if relation.schema().is_none() {
        return Err(Error::SchemaNotDefined {
            relation: relation.name().to_string(),
        });
    }
    Ok(())
}

/// The server's reply for one submitted tuple: the first response tuple, or
/// an empty tuple when the server returned no body.
fn first_or_empty(mut tuples: Vec<Tuple>) -> Tuple {
    if tuples.is_empty() {
        Tuple::new()
    } else {
        tuples.swap_remove(0)
    }
}

/// Batch insert via HTTP POST. Needs a schema for input coercion.
#[derive(Debug, Clone)]
pub struct Create {
    relation: Relation,
}

impl Create {
    pub fn new(relation: Relation) -> Result<Self> {
        require_schema(&relation)?;
        Ok(Self { relation })
    }

    pub async fn execute_one(&self, tuple: &Tuple) -> Result<Tuple> {
        Ok(first_or_empty(self.relation.insert(tuple).await?))
    }

    pub async fn execute_many(&self, tuples: &[Tuple]) -> Result<Vec<Tuple>> {
        let mut out = Vec::with_capacity(tuples.len());
        for (index, tuple) in tuples.iter().enumerate() {
            let result = self
                .execute_one(tuple)
                .await
                .map_err(|source| at_index(index, source))?;
            out.push(result);
        }
        Ok(out)
    }
}

/// Batch update via HTTP PUT, symmetric with [`Create`].
#[derive(Debug, Clone)]
pub struct Update {
    relation: Relation,
}

impl Update {
    pub fn new(relation: Relation) -> Result<Self> {
        require_schema(&relation)?;
        Ok(Self { relation })
    }

    pub async fn execute_one(&self, tuple: &Tuple) -> Result<Tuple> {
        Ok(first_or_empty(self.relation.update(tuple).await?))
    }

    pub async fn execute_many(&self, tuples: &[Tuple]) -> Result<Vec<Tuple>> {
        let mut out = Vec::with_capacity(tuples.len());
        for (index, tuple) in tuples.iter().enumerate() {
            let result = self
                .execute_one(tuple)
                .await
                .map_err(|source| at_index(index, source))?;
            out.push(result);
        }
        Ok(out)
    }
}

/// HTTP DELETE against the relation's path. Never asserts an affected-row
/// count: HTTP deletes do not report how many server-side rows changed.
#[derive(Debug, Clone)]
pub struct Delete {
    relation: Relation,
}

impl Delete {
    pub fn new(relation: Relation) -> Self {
        Self { relation }
    }

    pub async fn execute(&self) -> Result<Vec<Tuple>> {
        self.relation.delete().await
    }
}

fn at_index(index: usize, source: Error) -> Error {
    match source {
        // Only per-tuple failures get the index context; transport and
        // configuration problems are not about the tuple.
        coercion @ Error::Coercion { .. } => Error::TupleValidation {
            index,
            source: Box::new(coercion),
        },
        other => other,
    }
}
