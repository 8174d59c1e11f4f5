//! mutable traversal visitor for hcl expressions
use hcl::{
    template::{Directive, Element},
    Expression, Operation, Template, TemplateExpr, Traversal, TraversalOperator,
};

/// Visitor that visits its subjects mutably
pub(crate) trait VisitMut<T> {
    fn visit_mut(&mut self, value: &mut T);
}

impl<T, F> VisitMut<T> for F
where
    F: FnMut(&mut T),
{
    fn visit_mut(&mut self, value: &mut T) {
        self(value)
    }
}

/// Recursively visit all [Traversal]s mutably
///
/// A bare variable (`each`) is presented to the visitor as a traversal without operators. If the
/// visitor turns it into something else, the variable expression is replaced.
pub(crate) trait VisitTraversalsMut {
    fn visit_traversals_mut(&mut self, visitor: &mut dyn VisitMut<Traversal>);
}

impl VisitTraversalsMut for Expression {
    fn visit_traversals_mut(&mut self, visitor: &mut dyn VisitMut<Traversal>) {
        match self {
            Expression::Variable(variable) => {
                let mut traversal = Traversal::new(
                    Expression::Variable(variable.clone()),
                    Vec::<TraversalOperator>::new(),
                );
                visitor.visit_mut(&mut traversal);

                *self = if traversal.operators.is_empty() {
                    traversal.expr
                } else {
                    Expression::Traversal(Box::new(traversal))
                };
            }
            Expression::Traversal(traversal) => {
                visitor.visit_mut(traversal);
                traversal.expr.visit_traversals_mut(visitor);
                for operator in traversal.operators.iter_mut() {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_traversals_mut(visitor);
                    }
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_traversals_mut(visitor);
                }
            }
            Expression::Object(object) => {
                for value in object.values_mut() {
                    value.visit_traversals_mut(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                let Ok(mut template) = Template::from_expr(template_expr) else {
                    tracing::debug!(?template_expr, "template could not be parsed, not visited");
                    return;
                };
                template.visit_traversals_mut(visitor);
                *template_expr = Box::new(TemplateExpr::QuotedString(template.to_string()));
            }
            Expression::FuncCall(func_call) => {
                for arg in func_call.args.iter_mut() {
                    arg.visit_traversals_mut(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_traversals_mut(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_traversals_mut(visitor);
                cond.true_expr.visit_traversals_mut(visitor);
                cond.false_expr.visit_traversals_mut(visitor);
            }
            Expression::Operation(operation) => match operation.as_mut() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_traversals_mut(visitor);
                    binop.rhs_expr.visit_traversals_mut(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_traversals_mut(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr
                    .cond_expr
                    .iter_mut()
                    .for_each(|e| e.visit_traversals_mut(visitor));
                forexpr
                    .key_expr
                    .iter_mut()
                    .for_each(|e| e.visit_traversals_mut(visitor));
                forexpr.value_expr.visit_traversals_mut(visitor);
                forexpr.collection_expr.visit_traversals_mut(visitor);
            }
            _ => {}
        }
    }
}

impl VisitTraversalsMut for Template {
    fn visit_traversals_mut(&mut self, visitor: &mut dyn VisitMut<Traversal>) {
        for element in self.elements_mut() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_traversals_mut(visitor);
                }
                Element::Directive(Directive::If(ifdir)) => {
                    ifdir.cond_expr.visit_traversals_mut(visitor);
                    ifdir.true_template.visit_traversals_mut(visitor);
                    ifdir
                        .false_template
                        .iter_mut()
                        .for_each(|t| t.visit_traversals_mut(visitor));
                }
                Element::Directive(Directive::For(fordir)) => {
                    fordir.template.visit_traversals_mut(visitor);
                    fordir.collection_expr.visit_traversals_mut(visitor);
                }
                Element::Literal(_) => {}
            }
        }
    }
}
