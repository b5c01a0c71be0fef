use crate::operator::Operator;

pub type OperatorMatcher = fn(&Operator) -> bool;

/// A pattern defines how to match a sub tree of a plan.
///
/// To match `Filter(Project(_))` the pattern tree is:
/// ```
/// use basalt::operator::LogicalOperator::{LogicalFilter, LogicalProject};
/// use basalt::operator::Operator::Logical;
/// use basalt::rules::{any, pattern, PatterBuilder};
///
/// pattern(|op| matches!(op, Logical(LogicalFilter(_))))
///   .pattern(|op| matches!(op, Logical(LogicalProject(_))))
///     .leaf(any)
///   .finish()
/// .finish();
/// ```
///
/// Matching is structural only, conditions depending on the matched data are checked by
/// [`crate::rules::Rule::matches`].
pub struct Pattern {
    /// Matches against an operator.
    pub predict: OperatorMatcher,
    /// `None` for leaf node, whose inputs are bound as groups without descending.
    pub children: Option<Vec<Pattern>>,
}

impl Pattern {
    pub fn new_leaf(matcher: OperatorMatcher) -> Pattern {
        Pattern {
            predict: matcher,
            children: None,
        }
    }

    pub fn new<I: IntoIterator<Item = Pattern>>(matcher: OperatorMatcher, children: I) -> Pattern {
        let children = children.into_iter().collect::<Vec<Pattern>>();
        Pattern {
            predict: matcher,
            children: if children.is_empty() {
                None
            } else {
                Some(children)
            },
        }
    }

    pub fn matches(&self, operator: &Operator) -> bool {
        (self.predict)(operator)
    }
}

/// Matches any operator.
pub fn any(_: &Operator) -> bool {
    true
}

pub fn pattern(matcher: OperatorMatcher) -> RootPatternBuilder {
    RootPatternBuilder {
        matcher,
        inputs: vec![],
    }
}

pub trait PatterBuilder {
    type Child;
    type Output;
    fn pattern(self, matcher: OperatorMatcher) -> Self::Child;
    fn leaf(self, matcher: OperatorMatcher) -> Self;
    fn finish(self) -> Self::Output;
}

pub struct RootPatternBuilder {
    matcher: OperatorMatcher,
    inputs: Vec<Pattern>,
}

pub struct NonRootPatternBuilder<P> {
    parent_builder: P,
    matcher: OperatorMatcher,
    inputs: Vec<Pattern>,
}

trait AddChild {
    fn add_child(&mut self, pattern: Pattern);
}

impl<P> AddChild for NonRootPatternBuilder<P> {
    fn add_child(&mut self, pattern: Pattern) {
        self.inputs.push(pattern)
    }
}

impl AddChild for RootPatternBuilder {
    fn add_child(&mut self, pattern: Pattern) {
        self.inputs.push(pattern)
    }
}

impl<P: PatterBuilder + AddChild> PatterBuilder for NonRootPatternBuilder<P> {
    type Child = NonRootPatternBuilder<Self>;
    type Output = P;

    fn pattern(self, matcher: OperatorMatcher) -> Self::Child {
        NonRootPatternBuilder {
            parent_builder: self,
            matcher,
            inputs: vec![],
        }
    }

    fn leaf(mut self, matcher: OperatorMatcher) -> Self {
        self.add_child(Pattern::new_leaf(matcher));
        self
    }

    fn finish(mut self) -> P {
        self.parent_builder
            .add_child(Pattern::new(self.matcher, self.inputs));
        self.parent_builder
    }
}

impl PatterBuilder for RootPatternBuilder {
    type Child = NonRootPatternBuilder<Self>;
    type Output = Pattern;

    fn pattern(self, matcher: OperatorMatcher) -> Self::Child {
        NonRootPatternBuilder {
            parent_builder: self,
            matcher,
            inputs: vec![],
        }
    }

    fn leaf(mut self, matcher: OperatorMatcher) -> Self {
        self.add_child(Pattern::new_leaf(matcher));
        self
    }

    fn finish(self) -> Pattern {
        Pattern::new(self.matcher, self.inputs)
    }
}
