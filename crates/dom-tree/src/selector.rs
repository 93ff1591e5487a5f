//! Structural selector engine
//!
//! Supports comma groups, the four combinators, type/universal/id/class steps,
//! attribute tests and the positional pseudo-classes the controlled
//! application's markup needs (`:first-child`, `:last-child`, `:nth-child`).

use std::str::FromStr;

use crate::errors::SelectorError;
use crate::node::Element;

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Vec<SelectorPart>>,
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        if selector.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let groups = split_selector_groups(selector)?
            .iter()
            .map(|group| parse_selector_chain(group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.groups
            .iter()
            .any(|steps| matches_selector_chain(element, steps))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
    DashMatch { key: String, value: String },
}

impl AttrCondition {
    fn matches(&self, element: &Element) -> bool {
        match self {
            AttrCondition::Exists { key } => element.attr(key).is_some(),
            AttrCondition::Eq { key, value } => element.attr(key).as_ref() == Some(value),
            AttrCondition::StartsWith { key, value } => element
                .attr(key)
                .map(|v| !value.is_empty() && v.starts_with(value.as_str()))
                .unwrap_or(false),
            AttrCondition::EndsWith { key, value } => element
                .attr(key)
                .map(|v| !value.is_empty() && v.ends_with(value.as_str()))
                .unwrap_or(false),
            AttrCondition::Contains { key, value } => element
                .attr(key)
                .map(|v| !value.is_empty() && v.contains(value.as_str()))
                .unwrap_or(false),
            AttrCondition::Includes { key, value } => element
                .attr(key)
                .map(|v| v.split_ascii_whitespace().any(|token| token == value))
                .unwrap_or(false),
            AttrCondition::DashMatch { key, value } => element
                .attr(key)
                .map(|v| v == *value || v.starts_with(&format!("{value}-")))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    /// `position` is one-based.
    fn matches(&self, position: i64) -> bool {
        if self.a == 0 {
            return position == self.b;
        }
        let delta = position - self.b;
        delta % self.a == 0 && delta / self.a >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PseudoClass {
    FirstChild,
    LastChild,
    NthChild(Nth),
}

impl PseudoClass {
    fn matches(&self, element: &Element) -> bool {
        let Some(parent) = element.parent() else {
            return false;
        };
        let Some(index) = element.index_in_parent() else {
            return false;
        };
        match self {
            PseudoClass::FirstChild => index == 0,
            PseudoClass::LastChild => index + 1 == parent.child_element_count(),
            PseudoClass::NthChild(nth) => nth.matches(index as i64 + 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudo_classes: Vec<PseudoClass>,
}

impl SelectorStep {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id().as_ref() != Some(id) {
                return false;
            }
        }
        if self.classes.iter().any(|class| !element.has_class(class)) {
            return false;
        }
        if self.attrs.iter().any(|cond| !cond.matches(element)) {
            return false;
        }
        self.pseudo_classes.iter().all(|pseudo| pseudo.matches(element))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    step: SelectorStep,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

fn matches_selector_chain(element: &Element, steps: &[SelectorPart]) -> bool {
    let Some(last) = steps.last() else {
        return false;
    };
    if !last.step.matches(element) {
        return false;
    }

    let mut current = element.clone();
    for idx in (1..steps.len()).rev() {
        let prev_step = &steps[idx - 1].step;
        let combinator = steps[idx].combinator.unwrap_or(Combinator::Descendant);

        let matched = match combinator {
            Combinator::Child => current.parent().filter(|p| prev_step.matches(p)),
            Combinator::Descendant => {
                let mut cursor = current.parent();
                let mut found = None;
                while let Some(parent) = cursor {
                    if prev_step.matches(&parent) {
                        found = Some(parent);
                        break;
                    }
                    cursor = parent.parent();
                }
                found
            }
            Combinator::AdjacentSibling => current
                .previous_sibling()
                .filter(|sibling| prev_step.matches(sibling)),
            Combinator::GeneralSibling => {
                let mut cursor = current.previous_sibling();
                let mut found = None;
                while let Some(sibling) = cursor {
                    if prev_step.matches(&sibling) {
                        found = Some(sibling);
                        break;
                    }
                    cursor = sibling.previous_sibling();
                }
                found
            }
        };

        let Some(matched) = matched else {
            return false;
        };
        current = matched;
    }
    true
}

fn unsupported(selector: &str) -> SelectorError {
    SelectorError::Unsupported(selector.to_string())
}

fn split_selector_groups(selector: &str) -> Result<Vec<String>, SelectorError> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth
                    .checked_sub(1)
                    .ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            '(' => {
                paren_depth += 1;
                current.push(ch);
            }
            ')' => {
                paren_depth = paren_depth
                    .checked_sub(1)
                    .ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            ',' if bracket_depth == 0 && paren_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err(unsupported(selector));
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 || paren_depth != 0 || quote.is_some() {
        return Err(unsupported(selector));
    }
    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(unsupported(selector));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>, SelectorError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut quote: Option<char> = None;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.trim().is_empty() {
            tokens.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in selector.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth
                    .checked_sub(1)
                    .ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            '(' => {
                paren_depth += 1;
                current.push(ch);
            }
            ')' => {
                paren_depth = paren_depth
                    .checked_sub(1)
                    .ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            '>' | '+' | '~' if bracket_depth == 0 && paren_depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            ch if ch.is_whitespace() && bracket_depth == 0 && paren_depth == 0 => {
                flush(&mut current, &mut tokens);
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 || paren_depth != 0 || quote.is_some() {
        return Err(unsupported(selector));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>, SelectorError> {
    let tokens = tokenize_selector(selector)?;
    let mut steps: Vec<SelectorPart> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokens {
        let combinator = match token.as_str() {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::AdjacentSibling),
            "~" => Some(Combinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending.is_some() || steps.is_empty() {
                return Err(unsupported(selector));
            }
            pending = Some(combinator);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        steps.push(SelectorPart { step, combinator });
    }

    if steps.is_empty() || pending.is_some() {
        return Err(unsupported(selector));
    }
    Ok(steps)
}

fn parse_selector_step(part: &str) -> Result<SelectorStep, SelectorError> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal || step.tag.is_some() {
                    return Err(unsupported(part));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_ident(part, i + 1).ok_or_else(|| unsupported(part))?;
                if step.id.replace(id).is_some() {
                    return Err(unsupported(part));
                }
                i = next;
            }
            b'.' => {
                let (class, next) = parse_ident(part, i + 1).ok_or_else(|| unsupported(part))?;
                step.classes.push(class);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr_condition(part, i)?;
                step.attrs.push(cond);
                i = next;
            }
            b':' => {
                let (pseudo, next) = parse_pseudo(part, i + 1)?;
                step.pseudo_classes.push(pseudo);
                i = next;
            }
            _ => {
                if i != 0 {
                    return Err(unsupported(part));
                }
                let (tag, next) = parse_ident(part, i).ok_or_else(|| unsupported(part))?;
                step.tag = Some(tag);
                i = next;
            }
        }
    }
    Ok(step)
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b >= 0x80
}

fn parse_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let mut end = start;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    if end == start {
        return None;
    }
    Some((src.get(start..end)?.to_string(), end))
}

fn parse_pseudo(src: &str, start: usize) -> Result<(PseudoClass, usize), SelectorError> {
    let (name, next) = parse_ident(src, start).ok_or_else(|| unsupported(src))?;
    match name.as_str() {
        "first-child" => Ok((PseudoClass::FirstChild, next)),
        "last-child" => Ok((PseudoClass::LastChild, next)),
        "nth-child" => {
            let rest = src.get(next..).ok_or_else(|| unsupported(src))?;
            if !rest.starts_with('(') {
                return Err(unsupported(src));
            }
            let close = rest.find(')').ok_or_else(|| unsupported(src))?;
            let nth = parse_nth(&rest[1..close]).ok_or_else(|| unsupported(src))?;
            Ok((PseudoClass::NthChild(nth), next + close + 1))
        }
        _ => Err(unsupported(src)),
    }
}

fn parse_nth(raw: &str) -> Option<Nth> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.as_str() {
        "odd" => return Some(Nth { a: 2, b: 1 }),
        "even" => return Some(Nth { a: 2, b: 0 }),
        _ => {}
    }
    let Some((a_part, b_part)) = compact.split_once('n') else {
        let b = compact.parse::<i64>().ok()?;
        return (b > 0).then_some(Nth { a: 0, b });
    };
    let a = match a_part {
        "" | "+" => 1,
        "-" => -1,
        other => other.parse::<i64>().ok()?,
    };
    let b = if b_part.is_empty() {
        0
    } else {
        let digits = b_part.strip_prefix('+').unwrap_or(b_part);
        digits.parse::<i64>().ok()?
    };
    Some(Nth { a, b })
}

fn parse_attr_condition(src: &str, open: usize) -> Result<(AttrCondition, usize), SelectorError> {
    let close = src[open..]
        .find(']')
        .map(|offset| open + offset)
        .ok_or_else(|| unsupported(src))?;
    let body = src[open + 1..close].trim();

    let op_at = body.find(|c: char| matches!(c, '=' | '^' | '$' | '*' | '~' | '|'));
    let Some(op_at) = op_at else {
        if body.is_empty() || !body.bytes().all(|b| is_ident_char(b) || b == b':') {
            return Err(unsupported(src));
        }
        return Ok((
            AttrCondition::Exists {
                key: body.to_ascii_lowercase(),
            },
            close + 1,
        ));
    };

    let key = body[..op_at].trim().to_ascii_lowercase();
    if key.is_empty() {
        return Err(unsupported(src));
    }
    let rest = &body[op_at..];
    let (op, value_src) = if let Some(v) = rest.strip_prefix('=') {
        ("=", v)
    } else if rest.len() >= 2 && &rest[1..2] == "=" {
        (&rest[..1], &rest[2..])
    } else {
        return Err(unsupported(src));
    };
    let value = parse_attr_value(value_src.trim()).ok_or_else(|| unsupported(src))?;

    let cond = match op {
        "=" => AttrCondition::Eq { key, value },
        "^" => AttrCondition::StartsWith { key, value },
        "$" => AttrCondition::EndsWith { key, value },
        "*" => AttrCondition::Contains { key, value },
        "~" => AttrCondition::Includes { key, value },
        "|" => AttrCondition::DashMatch { key, value },
        _ => return Err(unsupported(src)),
    };
    Ok((cond, close + 1))
}

fn parse_attr_value(raw: &str) -> Option<String> {
    let first = raw.chars().next()?;
    if first == '"' || first == '\'' {
        let inner = raw.strip_prefix(first)?.strip_suffix(first)?;
        return Some(inner.replace('\\', ""));
    }
    if raw.chars().any(char::is_whitespace) {
        return None;
    }
    Some(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Document;

    fn page() -> Document {
        let doc = Document::new();
        let main = doc.create_element("div");
        main.set_id("calendarMain");
        doc.body().append_child(&main).unwrap();

        let toolbar = doc.create_element("div");
        toolbar.set_class_name("fc-toolbar fc-header-toolbar");
        main.append_child(&toolbar).unwrap();
        for label in ["prev", "next", "day"] {
            let chunk = doc.create_element("div");
            chunk.set_class_name("fc-toolbar-chunk");
            let btn = doc.create_element("button");
            btn.set_attr("data-original-title", label);
            btn.set_text(label);
            chunk.append_child(&btn).unwrap();
            toolbar.append_child(&chunk).unwrap();
        }
        doc
    }

    #[test]
    fn id_class_and_descendant() {
        let doc = page();
        let hits = doc
            .query_selector_all("#calendarMain .fc-toolbar-chunk button")
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn child_combinator_and_nth_child() {
        let doc = page();
        let second = doc
            .query_selector(".fc-toolbar > div:nth-child(2) > button")
            .unwrap()
            .unwrap();
        assert_eq!(second.text_content(), "next");
        let last = doc
            .query_selector(".fc-toolbar-chunk:last-child button")
            .unwrap()
            .unwrap();
        assert_eq!(last.text_content(), "day");
    }

    #[test]
    fn attribute_operators() {
        let doc = page();
        let exact = doc
            .query_selector("[data-original-title='day']")
            .unwrap()
            .unwrap();
        assert_eq!(exact.text_content(), "day");
        assert_eq!(
            doc.query_selector_all("[class*='toolbar-ch']").unwrap().len(),
            3
        );
        assert_eq!(
            doc.query_selector_all("[data-original-title^=ne]").unwrap().len(),
            1
        );
    }

    #[test]
    fn comma_groups_union_in_document_order() {
        let doc = page();
        let hits = doc
            .query_selector_all("button[data-original-title='day'], #calendarMain")
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id().as_deref(), Some("calendarMain"));
    }

    #[test]
    fn sibling_combinators() {
        let doc = page();
        assert_eq!(
            doc.query_selector_all(".fc-toolbar-chunk + .fc-toolbar-chunk")
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            doc.query_selector_all(".fc-toolbar-chunk:first-child ~ div")
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn nth_expressions() {
        assert_eq!(parse_nth("odd"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(parse_nth("2n + 1"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(parse_nth("-n+3"), Some(Nth { a: -1, b: 3 }));
        assert_eq!(parse_nth("4"), Some(Nth { a: 0, b: 4 }));
        assert!(Nth { a: -1, b: 3 }.matches(1));
        assert!(!Nth { a: -1, b: 3 }.matches(4));
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for bad in ["", "  ", "div >", "> div", "div[", "a,,b", ":hover", "div:nth-child(x)", "[=x]"] {
            assert!(Selector::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }
}
