use crate::error::Result;
use crate::model::{Schema, Transformer, Tuple};

/// Final stage of the response pipeline, selected by whether the relation
/// declares a schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseTransformer {
    /// Pass-through, optionally restricted to the dataset's projection list.
    #[default]
    Schemaless,
    /// Applies the schema's output transform per tuple; a projection then
    /// applies to the already-renamed keys.
    Schemad(Schema),
}

impl ResponseTransformer {
    pub fn call(&self, tuples: &[Tuple], projections: &[String]) -> Result<Vec<Tuple>> {
        match self {
            ResponseTransformer::Schemaless => {
                if projections.is_empty() {
                    Ok(tuples.to_vec())
                } else {
                    Ok(Transformer::new().accept_keys(projections).call(tuples))
                }
            }
            ResponseTransformer::Schemad(schema) => {
                let mut out = Vec::with_capacity(tuples.len());
                for tuple in tuples {
                    out.push(schema.apply(tuple)?);
                }
                if projections.is_empty() {
                    Ok(out)
                } else {
                    // Projected names the schema does not produce are
                    // silently ignored.
                    let known: Vec<&String> = {
                        let names = schema.attribute_names();
                        projections
                            .iter()
                            .filter(|p| names.contains(&p.as_str()))
                            .collect()
                    };
                    Ok(Transformer::new().accept_keys(&known).call(&out))
                }
            }
        }
    }
}
