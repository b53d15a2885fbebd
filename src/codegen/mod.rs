//! Code generation
//!
//! Orchestrates the pipeline: reference checks, cycle breaking, path
//! inference, then emission. The model is frozen after `Generator::build`;
//! the emitter is a pure projection and never mutates it.

pub mod rust;

use tracing::warn;

use crate::error::{Result, SchemaError};
use crate::graph::{break_cycles, infer_paths, reference_report, CastPath, SccAnalysis};
use crate::parser::parse_document;
use crate::schema::Schema;

/// The analyzed schema, ready for emission
#[derive(Debug)]
pub struct Generator {
    schema: Schema,
    analysis: SccAnalysis,
    paths: Vec<CastPath>,
}

impl Generator {
    /// Run reference checks and the analysis passes over a parsed schema.
    ///
    /// Dangling references are fatal in strict mode, otherwise warned about.
    /// Unreferenced types are always warned about.
    pub fn build(mut schema: Schema) -> Result<Self> {
        let report = reference_report(&schema);
        if schema.config.strict {
            if let Some((referrer, name)) = report.unknown.first() {
                return Err(SchemaError::UnknownReference {
                    name: name.clone(),
                    referrer: referrer.clone(),
                });
            }
        }
        for (referrer, name) in &report.unknown {
            warn!(ty = %name, from = %referrer, "reference to unknown type");
        }
        for name in &report.unreferenced {
            warn!(ty = %name, "type is never referenced");
        }

        let analysis = break_cycles(&mut schema)?;
        let paths = infer_paths(&schema);

        Ok(Self {
            schema,
            analysis,
            paths,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn analysis(&self) -> &SccAnalysis {
        &self.analysis
    }

    pub fn paths(&self) -> &[CastPath] {
        &self.paths
    }

    /// Project the analyzed model to Rust source text
    pub fn emit(&self) -> String {
        rust::emit_module(&self.schema, &self.paths)
    }
}

/// Parse, analyze, and emit in one step
pub fn generate(text: &str) -> Result<String> {
    let schema = parse_document(text)?;
    Ok(Generator::build(schema)?.emit())
}
