//! evaluation context built from `variable` and `locals` declarations
//!
//! Terraform allows locals to reference each other in any order and across files. Instead of
//! ordering them by dependency we evaluate them repeatedly: every pass tries each local that is
//! still unresolved against everything resolved so far (including results of the current pass).
//! We stop once a pass makes no progress or after [MAX_LOCAL_PASSES] passes.
//!
//! Locals that remain unresolved are absent from the context. Each of them is reported once with a
//! warning and can be inspected via [EvaluationContext::unresolved_locals].
use crate::eval::{self, EvalError};
use crate::tags::{Casing, TagMap};
use crate::terraform_documents::TerraformDocuments;
use crate::util;
use crate::value::Value;

/// Upper bound of fixed-point passes over locals
pub const MAX_LOCAL_PASSES: usize = 10;

type ValueMap = hcl::value::Map<String, hcl::Value>;

/// Immutable evaluation context: `var.*`, `local.*` and the function library
pub struct EvaluationContext {
    variables: ValueMap,
    locals: ValueMap,
    unresolved_locals: Vec<String>,
    ctx: hcl::eval::Context<'static>,
}

impl EvaluationContext {
    /// A context without any variables or locals
    pub fn empty() -> Self {
        Self::new(ValueMap::new(), ValueMap::new(), vec![])
    }

    fn new(variables: ValueMap, locals: ValueMap, unresolved_locals: Vec<String>) -> Self {
        let mut ctx = base_context();
        ctx.declare_var("var", hcl::Value::Object(variables.clone()));
        ctx.declare_var("local", hcl::Value::Object(locals.clone()));

        Self {
            variables,
            locals,
            unresolved_locals,
            ctx,
        }
    }

    /// Scans all documents for declarations and resolves them
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(documents: &TerraformDocuments) -> Self {
        let declarations = Declarations::collect(documents);

        let variables = resolve_variables(&declarations.variables);
        let (locals, unresolved_locals) = resolve_locals(&variables, declarations.locals);

        for name in &unresolved_locals {
            tracing::warn!(local = %name, "could not resolve local, it is treated as absent");
        }

        tracing::info!(
            variables = variables.len(),
            locals = locals.len(),
            unresolved = unresolved_locals.len(),
            "evaluation context built"
        );

        Self::new(variables, locals, unresolved_locals)
    }

    pub fn evaluate(&self, expression: &hcl::Expression) -> Result<Value, EvalError> {
        eval::evaluate(expression, &self.ctx)
    }

    /// Evaluate with `each.*` and `count.*` bound to placeholders
    pub fn evaluate_per_item(&self, expression: &hcl::Expression) -> Result<Value, EvalError> {
        let expression = util::with_iteration_placeholders(expression);

        let mut ctx = self.ctx.clone();
        let each: ValueMap = [
            ("key".to_string(), hcl::Value::String(String::new())),
            ("value".to_string(), hcl::Value::String(String::new())),
        ]
        .into_iter()
        .collect();
        let count: ValueMap = [("index".to_string(), hcl::Value::Number(0u64.into()))]
            .into_iter()
            .collect();
        ctx.declare_var("each", hcl::Value::Object(each));
        ctx.declare_var("count", hcl::Value::Object(count));

        eval::evaluate(&expression, &ctx)
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned().map(Into::into)
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        self.locals.get(name).cloned().map(Into::into)
    }

    /// Names of locals that could not be resolved
    pub fn unresolved_locals(&self) -> &[String] {
        &self.unresolved_locals
    }
}

impl PartialEq for EvaluationContext {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables
            && self.locals == other.locals
            && self.unresolved_locals == other.unresolved_locals
    }
}

impl std::fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("variables", &self.variables)
            .field("locals", &self.locals)
            .field("unresolved_locals", &self.unresolved_locals)
            .finish_non_exhaustive()
    }
}

fn base_context() -> hcl::eval::Context<'static> {
    let mut ctx = hcl::eval::Context::new();
    crate::functions::declare_all(&mut ctx);
    ctx
}

/// Unevaluated declarations, in declaration order
#[derive(Default)]
struct Declarations {
    /// variable name to its default expression
    variables: indexmap::IndexMap<String, Option<hcl::Expression>>,
    /// local name to its expression
    locals: indexmap::IndexMap<String, hcl::Expression>,
}

impl Declarations {
    fn collect(documents: &TerraformDocuments) -> Self {
        let mut declarations = Self::default();

        for (_, source, block) in documents.blocks_of("variable") {
            let Some(name) = block.labels.first() else {
                tracing::debug!(path=%source.path.display(), "variable without name");
                continue;
            };

            let default = util::find_attribute(block, "default");

            declarations
                .variables
                .insert(name.as_str().to_string(), default);
        }

        for (_, source, block) in documents.blocks_of("locals") {
            for attribute in block.body.attributes() {
                let name = attribute.key.value().as_str().to_string();
                let previous = declarations
                    .locals
                    .insert(name.clone(), attribute.value.clone().into());

                if previous.is_some() {
                    tracing::warn!(local = %name, path=%source.path.display(), "duplicate local, last declaration wins");
                }
            }
        }

        declarations
    }
}

/// Variables never depend on anything but functions; failures become `null`
fn resolve_variables(
    declarations: &indexmap::IndexMap<String, Option<hcl::Expression>>,
) -> ValueMap {
    let ctx = base_context();

    declarations
        .iter()
        .map(|(name, default)| {
            let value = match default {
                None => hcl::Value::Null,
                Some(expression) => match eval::evaluate(expression, &ctx) {
                    Ok(value) => value.into(),
                    Err(error) => {
                        tracing::debug!(variable = %name, %error, "variable default unresolvable, using null");
                        hcl::Value::Null
                    }
                },
            };

            (name.clone(), value)
        })
        .collect()
}

/// Fixed-point resolution of locals
///
/// Returns the resolved locals and the names of those left unresolved.
fn resolve_locals(
    variables: &ValueMap,
    mut pending: indexmap::IndexMap<String, hcl::Expression>,
) -> (ValueMap, Vec<String>) {
    let mut ctx = base_context();
    ctx.declare_var("var", hcl::Value::Object(variables.clone()));

    let mut locals = ValueMap::new();

    for pass in 1..=MAX_LOCAL_PASSES {
        if pending.is_empty() {
            break;
        }

        let before = pending.len();
        pending.retain(|name, expression| {
            ctx.declare_var("local", hcl::Value::Object(locals.clone()));

            match eval::evaluate(expression, &ctx) {
                Ok(value) => {
                    tracing::trace!(local = %name, pass, "resolved");
                    locals.insert(name.clone(), value.into());
                    false
                }
                Err(error) => {
                    tracing::trace!(local = %name, pass, %error, "not resolved yet");
                    true
                }
            }
        });

        if pending.len() == before {
            tracing::debug!(pass, "no progress, stopping");
            break;
        }
    }

    (locals, pending.into_keys().collect())
}

/// Object-shaped variables and locals by their reference name
///
/// Nested objects are addressable as well (`local.tags.common`).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReferenceTable {
    entries: indexmap::IndexMap<String, TagMap>,
}

impl ReferenceTable {
    pub fn from_context(context: &EvaluationContext, casing: Casing) -> Self {
        let mut table = Self::default();

        for (name, value) in &context.variables {
            table.insert_recursive(format!("var.{name}"), &value.clone().into(), casing);
        }
        for (name, value) in &context.locals {
            table.insert_recursive(format!("local.{name}"), &value.clone().into(), casing);
        }

        table
    }

    fn insert_recursive(&mut self, path: String, value: &Value, casing: Casing) {
        let Some(object) = value.as_object() else {
            return;
        };

        for (key, child) in object {
            if child.as_object().is_some() {
                self.insert_recursive(format!("{path}.{key}"), child, casing);
            }
        }

        if let Some(tags) = TagMap::from_value(value, casing) {
            self.entries.insert(path, tags);
        }
    }

    pub fn get(&self, reference: &str) -> Option<&TagMap> {
        self.entries.get(reference)
    }

    /// Tags of `expression` if it is a bare reference to a known object
    pub fn lookup(&self, expression: &hcl::Expression) -> Option<&TagMap> {
        util::bare_reference(expression).and_then(|reference| self.get(&reference))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the evaluation context and the reference table
pub fn resolve(documents: &TerraformDocuments, casing: Casing) -> (EvaluationContext, ReferenceTable) {
    let context = EvaluationContext::build(documents);
    let references = ReferenceTable::from_context(&context, casing);
    (context, references)
}
