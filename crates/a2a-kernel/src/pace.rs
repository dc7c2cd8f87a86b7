//! PACE escalation state machine and its trigger expression DSL
//! (spec.md §4.5.1, §9 "Re-architect as a tiny tokeniser + recursive-descent
//! parser into a small expression AST").
//!
//! Grounded on
//! `examples/original_source/extensions/before_main_llm_call/_12_org_dispatcher.py`
//! (`_evaluate_pace`, `_check_pace_trigger`).

use a2a_core::salute::PaceLevel;

/// The metrics a trigger expression may reference (spec.md §4.5.1 "Inputs
/// at each tick").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ConsecutiveToolFailures,
    ContextFill,
    TurnsWithoutProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
}

/// The right-hand side of a condition: either a literal number, or `max`
/// (optionally scaled, e.g. `max * 1.5`) — bound to the role's own
/// `doctrine.max_turns_without_progress` per the Open Question decision
/// recorded in SPEC_FULL.md §9.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueExpr {
    Literal(f32),
    Max(f32),
}

impl ValueExpr {
    fn resolve(self, max_turns_without_progress: u32) -> f32 {
        match self {
            Self::Literal(v) => v,
            Self::Max(multiplier) => max_turns_without_progress as f32 * multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub metric: Metric,
    pub comparator: Comparator,
    pub value: ValueExpr,
}

/// Parsed trigger expression AST. Conditions combine only with `OR`
/// (spec.md §4.5.1 names only this combinator).
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerExpr {
    Condition(Condition),
    Or(Box<TriggerExpr>, Box<TriggerExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trigger parse error: {}", self.0)
    }
}

/// Tokenizes and parses a trigger expression, e.g.
/// `"consecutive_tool_failures >= 5 OR turns_without_progress > max * 1.5"`.
pub fn parse_trigger(src: &str) -> Result<TriggerExpr, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError(format!("unexpected trailing input at token {}", parser.pos)));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f32),
    Comparator(Comparator),
    Star,
    Or,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '*' {
            tokens.push(Token::Star);
            i += 1;
            continue;
        }
        if c == '>' || c == '<' || c == '=' || c == '!' {
            let mut op = String::new();
            op.push(c);
            if i + 1 < chars.len() && chars[i + 1] == '=' {
                op.push('=');
                i += 2;
            } else {
                i += 1;
            }
            let cmp = match op.as_str() {
                ">=" => Comparator::Ge,
                ">" => Comparator::Gt,
                "<=" => Comparator::Le,
                "<" => Comparator::Lt,
                "==" => Comparator::Eq,
                other => return Err(ParseError(format!("unknown operator {other}"))),
            };
            tokens.push(Token::Comparator(cmp));
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n: f32 = text.parse().map_err(|_| ParseError(format!("bad number {text}")))?;
            tokens.push(Token::Number(n));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if word.eq_ignore_ascii_case("or") {
                tokens.push(Token::Or);
            } else {
                tokens.push(Token::Ident(word));
            }
            continue;
        }
        return Err(ParseError(format!("unexpected character {c:?}")));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<TriggerExpr, ParseError> {
        let mut lhs = self.parse_condition()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            let rhs = self.parse_condition()?;
            lhs = TriggerExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_condition(&mut self) -> Result<TriggerExpr, ParseError> {
        let metric = match self.bump() {
            Some(Token::Ident(name)) => match name.as_str() {
                "consecutive_tool_failures" => Metric::ConsecutiveToolFailures,
                "context_fill" => Metric::ContextFill,
                "turns_without_progress" => Metric::TurnsWithoutProgress,
                other => return Err(ParseError(format!("unknown metric {other}"))),
            },
            other => return Err(ParseError(format!("expected metric, got {other:?}"))),
        };
        let comparator = match self.bump() {
            Some(Token::Comparator(c)) => c,
            other => return Err(ParseError(format!("expected comparator, got {other:?}"))),
        };
        let value = self.parse_value()?;
        Ok(TriggerExpr::Condition(Condition { metric, comparator, value }))
    }

    fn parse_value(&mut self) -> Result<ValueExpr, ParseError> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(ValueExpr::Literal(n)),
            Some(Token::Ident(word)) if word == "max" => {
                if matches!(self.peek(), Some(Token::Star)) {
                    self.bump();
                    match self.bump() {
                        Some(Token::Number(n)) => Ok(ValueExpr::Max(n)),
                        other => Err(ParseError(format!("expected multiplier after 'max *', got {other:?}"))),
                    }
                } else {
                    Ok(ValueExpr::Max(1.0))
                }
            }
            other => Err(ParseError(format!("expected value, got {other:?}"))),
        }
    }
}

/// Inputs available at a single PACE evaluation tick (spec.md §4.5.1).
#[derive(Debug, Clone, Copy)]
pub struct PaceMetrics {
    pub max_consecutive: u32,
    pub turns_without_progress: u32,
    pub context_fill: f32,
    pub max_turns_without_progress: u32,
}

impl TriggerExpr {
    pub fn evaluate(&self, metrics: &PaceMetrics) -> bool {
        match self {
            Self::Condition(cond) => {
                let lhs = match cond.metric {
                    Metric::ConsecutiveToolFailures => metrics.max_consecutive as f32,
                    Metric::ContextFill => metrics.context_fill,
                    Metric::TurnsWithoutProgress => metrics.turns_without_progress as f32,
                };
                let rhs = cond.value.resolve(metrics.max_turns_without_progress);
                match cond.comparator {
                    Comparator::Ge => lhs >= rhs,
                    Comparator::Gt => lhs > rhs,
                    Comparator::Le => lhs <= rhs,
                    Comparator::Lt => lhs < rhs,
                    Comparator::Eq => (lhs - rhs).abs() < f32::EPSILON,
                }
            }
            Self::Or(a, b) => a.evaluate(metrics) || b.evaluate(metrics),
        }
    }
}

/// Result of one PACE evaluation: the resulting level and whether it
/// represents a transition from the previous level (spec.md §4.5.1
/// "Transitions emit a log entry ... and cause an immediate SALUTE").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceOutcome {
    pub level: PaceLevel,
    pub transitioned: bool,
}

/// Evaluates the PACE FSM for one tick (spec.md §4.5.1, first match wins).
///
/// `emergency_trigger_text` is the raw `pace_plan.emergency.trigger` string;
/// per spec.md it is checked for the literal marker `unrecoverable_error`
/// as a hardcoded condition alongside the general `turns_without_progress >
/// 1.5 * max_turns` check — these are independent of the generic DSL parser,
/// which is used only for the contingent/alternate rungs.
pub fn evaluate_pace(
    metrics: PaceMetrics,
    emergency_trigger_text: Option<&str>,
    contingent_trigger: Option<&TriggerExpr>,
    alternate_trigger: Option<&TriggerExpr>,
    previous: PaceLevel,
) -> PaceOutcome {
    let emergency_unrecoverable = emergency_trigger_text
        .map(|t| t.contains("unrecoverable_error"))
        .unwrap_or(false)
        && metrics.max_consecutive >= 8;
    let emergency_stagnant =
        metrics.turns_without_progress as f32 > 1.5 * metrics.max_turns_without_progress as f32;

    let level = if emergency_unrecoverable || emergency_stagnant {
        PaceLevel::Emergency
    } else if contingent_trigger.map(|t| t.evaluate(&metrics)).unwrap_or(false) {
        PaceLevel::Contingent
    } else if alternate_trigger.map(|t| t.evaluate(&metrics)).unwrap_or(false) {
        PaceLevel::Alternate
    } else {
        PaceLevel::Primary
    };

    PaceOutcome { level, transitioned: level != previous }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_condition() {
        let expr = parse_trigger("consecutive_tool_failures >= 5").unwrap();
        assert!(expr.evaluate(&PaceMetrics {
            max_consecutive: 5,
            turns_without_progress: 0,
            context_fill: 0.0,
            max_turns_without_progress: 10,
        }));
        assert!(!expr.evaluate(&PaceMetrics {
            max_consecutive: 4,
            turns_without_progress: 0,
            context_fill: 0.0,
            max_turns_without_progress: 10,
        }));
    }

    #[test]
    fn parses_or_with_max_multiplier() {
        let expr = parse_trigger("context_fill > 0.9 OR turns_without_progress > max * 1.5").unwrap();
        let metrics =
            PaceMetrics { max_consecutive: 0, turns_without_progress: 16, context_fill: 0.1, max_turns_without_progress: 10 };
        assert!(expr.evaluate(&metrics));
        let metrics2 =
            PaceMetrics { max_consecutive: 0, turns_without_progress: 5, context_fill: 0.1, max_turns_without_progress: 10 };
        assert!(!expr.evaluate(&metrics2));
    }

    #[test]
    fn emergency_wins_over_contingent() {
        let contingent = parse_trigger("consecutive_tool_failures >= 3").unwrap();
        let metrics = PaceMetrics {
            max_consecutive: 8,
            turns_without_progress: 0,
            context_fill: 0.0,
            max_turns_without_progress: 4,
        };
        let outcome =
            evaluate_pace(metrics, Some("unrecoverable_error"), Some(&contingent), None, PaceLevel::Primary);
        assert_eq!(outcome.level, PaceLevel::Emergency);
        assert!(outcome.transitioned);
    }

    #[test]
    fn emergency_stagnation_without_trigger_text() {
        let metrics = PaceMetrics {
            max_consecutive: 0,
            turns_without_progress: 7,
            context_fill: 0.0,
            max_turns_without_progress: 4,
        };
        let outcome = evaluate_pace(metrics, None, None, None, PaceLevel::Primary);
        assert_eq!(outcome.level, PaceLevel::Emergency);
    }

    #[test]
    fn no_trigger_matches_stays_primary() {
        let metrics = PaceMetrics {
            max_consecutive: 0,
            turns_without_progress: 1,
            context_fill: 0.1,
            max_turns_without_progress: 10,
        };
        let outcome = evaluate_pace(metrics, None, None, None, PaceLevel::Contingent);
        assert_eq!(outcome.level, PaceLevel::Primary);
        assert!(outcome.transitioned);
    }
}
