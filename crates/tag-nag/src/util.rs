use crate::visit::{VisitMut, VisitTraversalsMut};
use hcl::{Expression, Identifier, Traversal, TraversalOperator};

/// Names bound per item inside a resource using `for_each` or `count`
const ITERATION_ROOTS: [&str; 2] = ["each", "count"];

/// Replaces `each.*` and `count.*` with constant placeholders
///
/// Real per-item expansion is not performed. `count.index` becomes `0`, everything else becomes
/// the empty string, so tag expressions using them still evaluate.
#[derive(Default)]
pub(crate) struct IterationPlaceholderRewriter;

impl VisitMut<Traversal> for IterationPlaceholderRewriter {
    fn visit_mut(&mut self, traversal: &mut Traversal) {
        let path = traversal.get_longest_path();
        let Some(root) = path.first() else {
            return;
        };

        if !ITERATION_ROOTS.contains(&root.as_str()) {
            return;
        }

        let placeholder = match path.get(1).map(Identifier::as_str) {
            Some("index") if root.as_str() == "count" => Expression::Number(0u64.into()),
            _ => Expression::String(String::new()),
        };

        let len = traversal.operators.len() + 1;
        traversal.apply_substitution(placeholder, len);
    }
}

/// Returns `expression` with all iteration references replaced by placeholders
pub(crate) fn with_iteration_placeholders(expression: &Expression) -> Expression {
    let mut expression = expression.clone();
    expression.visit_traversals_mut(&mut IterationPlaceholderRewriter);
    expression
}

/// Dotted name of a bare reference (`local.tags`, `aws.west`)
///
/// Only variables and traversals consisting solely of attribute access qualify.
pub(crate) fn bare_reference(expression: &Expression) -> Option<String> {
    let traversal = match expression {
        Expression::Variable(var) => return Some(var.as_str().to_string()),
        Expression::Traversal(traversal) => traversal,
        _ => return None,
    };

    let path = traversal.get_longest_path();
    if path.is_empty() || path.len() != traversal.operators.len() + 1 {
        return None;
    }

    Some(
        path.iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join("."),
    )
}

/// Value of an attribute in the block body, converted for evaluation
pub(crate) fn find_attribute(block: &hcl_edit::structure::Block, key: &str) -> Option<Expression> {
    block
        .body
        .attributes()
        .find(|attribute| attribute.key.value().as_str() == key)
        .map(|attribute| attribute.value.clone().into())
}

pub(crate) trait TraversalExt {
    fn apply_substitution(&mut self, expr: Expression, path_len: usize);
    fn get_longest_path(&self) -> Vec<Identifier>;
    fn squash(&mut self);
}

impl TraversalExt for Traversal {
    /// Replace the first `path_len` elements (root + operators) with `expr`
    #[tracing::instrument(level = "trace")]
    fn apply_substitution(&mut self, expr: Expression, path_len: usize) {
        let remove = path_len.saturating_sub(1);

        self.expr = expr;

        if remove >= self.operators.len() {
            self.operators.clear();
        } else {
            self.operators.drain(..remove);
        }

        self.squash();

        tracing::trace!(traversal=?self, "after substitution");
    }

    /// Root variable followed by all leading attribute accesses
    ///
    /// `local.network.subnets[0].id` yields `[local, network, subnets]`
    fn get_longest_path(&self) -> Vec<Identifier> {
        let Expression::Variable(var) = &self.expr else {
            return vec![];
        };

        let mut path = vec![Identifier::unchecked(var.as_str())];
        for operator in &self.operators {
            let TraversalOperator::GetAttr(ident) = operator else {
                break;
            };

            path.push(ident.clone());
        }

        path
    }

    /// Squash nested Traversals
    ///
    /// Turns `<foo.bar>.baz` into `foo.bar.baz`.
    fn squash(&mut self) {
        let Traversal {
            expr: Expression::Traversal(inner),
            operators,
            ..
        } = self
        else {
            return;
        };

        inner.operators.append(operators);
        std::mem::swap(&mut self.operators, &mut inner.operators);

        self.expr = std::mem::replace(&mut inner.expr, Expression::Null);
        tracing::trace!(traversal=?self, "traversal squashed")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eval::test::expr;
    use pretty_assertions::assert_eq;

    #[test]
    fn apply_substitution() {
        let mut traversal = Traversal::builder(hcl::Variable::unchecked("one"))
            .attr("two")
            .attr("three")
            .attr("four")
            .build();

        traversal.apply_substitution(hcl::Variable::unchecked("substitution").into(), 3);

        let expected = Traversal::builder(hcl::Variable::unchecked("substitution"))
            .attr("four")
            .build();

        assert_eq!(traversal, expected);
    }

    #[test]
    fn longest_path_stops_at_index() {
        let Expression::Traversal(traversal) = expr("local.network.subnets[0].id") else {
            panic!("expected a traversal");
        };

        let path: Vec<_> = traversal
            .get_longest_path()
            .iter()
            .map(|ident| ident.to_string())
            .collect();
        assert_eq!(path, vec!["local", "network", "subnets"]);
    }

    #[test]
    fn bare_references() {
        assert_eq!(bare_reference(&expr("local.tags")), Some("local.tags".into()));
        assert_eq!(bare_reference(&expr("aws.west")), Some("aws.west".into()));
        assert_eq!(bare_reference(&expr("local.tags[0]")), None);
        assert_eq!(bare_reference(&expr(r#""aws""#)), None);
    }

    #[test]
    fn iteration_placeholders() {
        let rewritten = with_iteration_placeholders(&expr(
            r#"{ Name = each.key, Team = each.value.team, Index = count.index, Env = var.env }"#,
        ));

        let ctx = {
            let mut ctx = hcl::eval::Context::new();
            let var: hcl::value::Map<String, hcl::Value> =
                [("env".to_string(), hcl::Value::from("dev"))]
                    .into_iter()
                    .collect();
            ctx.declare_var("var", hcl::Value::Object(var));
            ctx
        };

        let value = crate::eval::evaluate(&rewritten, &ctx).expect("must evaluate");
        let tags = crate::tags::TagMap::from_value(&value, crate::tags::Casing::Sensitive).unwrap();
        let expected: crate::tags::TagMap =
            [("Name", ""), ("Team", ""), ("Index", "0"), ("Env", "dev")]
                .into_iter()
                .collect();

        assert_eq!(tags, expected);
    }

    #[test]
    fn iteration_placeholders_in_templates() {
        let rewritten = with_iteration_placeholders(&expr(r#""app-${each.key}""#));
        let value = crate::eval::evaluate_literal(&rewritten).expect("must evaluate");

        assert_eq!(value, crate::value::Value::from("app-"));
    }
}
