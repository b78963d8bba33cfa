use super::*;

/// One compound selector such as `button.primary[data-ha=save]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    // (name, expected value); `None` only requires presence.
    attrs: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// A subject compound plus the compounds to its left, nearest first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

fn parse_selector_list(source: &str) -> Result<Vec<Complex>> {
    let mut parser = SelectorParser {
        source,
        chars: source.chars().collect(),
        pos: 0,
    };
    parser.list()
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl SelectorParser<'_> {
    fn unsupported(&self) -> Error {
        Error::UnsupportedSelector(self.source.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn list(&mut self) -> Result<Vec<Complex>> {
        let mut out = vec![self.complex()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            out.push(self.complex()?);
        }
        if self.pos != self.chars.len() {
            return Err(self.unsupported());
        }
        Ok(out)
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_whitespace();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let spaced = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    combinators.push(Combinator::Child);
                }
                Some(_) if spaced => combinators.push(Combinator::Descendant),
                // `+`, `~` and anything glued to the previous compound.
                Some(_) => return Err(self.unsupported()),
            }
            compounds.push(self.compound()?);
        }

        let subject = compounds.pop().ok_or_else(|| self.unsupported())?;
        let mut ancestors = Vec::with_capacity(compounds.len());
        while let (Some(compound), Some(combinator)) = (compounds.pop(), combinators.pop()) {
            ancestors.push((combinator, compound));
        }
        Ok(Complex { subject, ancestors })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut empty = true;

        if self.peek() == Some('*') {
            self.pos += 1;
            empty = false;
        } else if let Some(tag) = self.ident() {
            compound.tag = Some(tag.to_ascii_lowercase());
            empty = false;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.ident().ok_or_else(|| self.unsupported())?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.unsupported());
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    let class_name = self.ident().ok_or_else(|| self.unsupported())?;
                    compound.classes.push(class_name);
                }
                Some('[') => {
                    self.pos += 1;
                    let attr = self.attribute()?;
                    compound.attrs.push(attr);
                }
                _ => break,
            }
            empty = false;
        }

        if empty {
            return Err(self.unsupported());
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<(String, Option<String>)> {
        self.skip_whitespace();
        let name = self
            .ident()
            .ok_or_else(|| self.unsupported())?
            .to_ascii_lowercase();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(']') => None,
            Some('=') => {
                self.pos += 1;
                self.skip_whitespace();
                Some(self.attribute_value()?)
            }
            _ => return Err(self.unsupported()),
        };

        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.unsupported());
        }
        self.pos += 1;
        Ok((name, value))
    }

    fn attribute_value(&mut self) -> Result<String> {
        let Some(quote @ ('"' | '\'')) = self.peek() else {
            return self.ident().ok_or_else(|| self.unsupported());
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.unsupported());
        }
        let value = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(value)
    }
}

impl Dom {
    /// Elements below `scope` (exclusive) matching `selector`, in document order.
    pub(crate) fn query_selector_all_from(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>> {
        let list = parse_selector_list(selector)?;
        let mut candidates = self.descendant_elements(scope);
        candidates.retain(|node| self.matches_any(*node, &list));
        Ok(candidates)
    }

    pub(crate) fn query_selector_from(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>> {
        let list = parse_selector_list(selector)?;
        Ok(self
            .descendant_elements(scope)
            .into_iter()
            .find(|node| self.matches_any(*node, &list)))
    }

    pub(crate) fn matches_selector(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        let list = parse_selector_list(selector)?;
        Ok(self.matches_any(node_id, &list))
    }

    fn matches_any(&self, node_id: NodeId, list: &[Complex]) -> bool {
        list.iter().any(|complex| {
            self.matches_compound(node_id, &complex.subject)
                && self.matches_ancestors(node_id, &complex.ancestors)
        })
    }

    fn matches_ancestors(&self, node_id: NodeId, rest: &[(Combinator, Compound)]) -> bool {
        let Some(((combinator, compound), rest)) = rest.split_first() else {
            return true;
        };
        match combinator {
            Combinator::Child => self.parent(node_id).is_some_and(|parent| {
                self.matches_compound(parent, compound) && self.matches_ancestors(parent, rest)
            }),
            Combinator::Descendant => {
                let mut cursor = self.parent(node_id);
                while let Some(ancestor) = cursor {
                    if self.matches_compound(ancestor, compound)
                        && self.matches_ancestors(ancestor, rest)
                    {
                        return true;
                    }
                    cursor = self.parent(ancestor);
                }
                false
            }
        }
    }

    fn matches_compound(&self, node_id: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        compound
            .tag
            .as_ref()
            .is_none_or(|tag| element.tag_name.eq_ignore_ascii_case(tag))
            && compound
                .id
                .as_ref()
                .is_none_or(|id| element.attrs.get("id") == Some(id))
            && compound
                .classes
                .iter()
                .all(|class_name| element.has_class(class_name))
            && compound.attrs.iter().all(|(name, expected)| {
                match (element.attrs.get(name), expected) {
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == expected,
                    (None, _) => false,
                }
            })
    }
}
