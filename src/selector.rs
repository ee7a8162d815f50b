use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorPseudoClass {
    FirstChild,
    LastChild,
    Not(Vec<Vec<SelectorPart>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
    pub(crate) pseudo_classes: Vec<SelectorPseudoClass>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudo_classes.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

/// Parses a selector list such as `#address p, .line > select[name$=country]`.
pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let mut parser = SelectorParser {
        src: selector,
        pos: 0,
    };
    parser.parse_list(None)
}

struct SelectorParser<'a> {
    src: &'a str,
    pos: usize,
}

impl SelectorParser<'_> {
    fn unsupported(&self) -> Error {
        Error::UnsupportedSelector(self.src.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &str {
        let start = self.pos;
        while self.peek().is_some_and(&accept) {
            self.pos += 1;
        }
        self.src.get(start..self.pos).unwrap_or_default()
    }

    /// Comma separated chains, up to the end of input or `closing`.
    fn parse_list(&mut self, closing: Option<u8>) -> Result<Vec<Vec<SelectorPart>>> {
        let mut groups = Vec::new();
        loop {
            groups.push(self.parse_chain()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                None if closing.is_none() => return Ok(groups),
                Some(b) if Some(b) == closing => {
                    self.pos += 1;
                    return Ok(groups);
                }
                _ => return Err(self.unsupported()),
            }
        }
    }

    fn parse_chain(&mut self) -> Result<Vec<SelectorPart>> {
        let mut parts = Vec::new();
        let mut pending = None;
        loop {
            self.skip_ws();
            match self.peek() {
                None | Some(b',' | b')') => break,
                Some(b'>') => {
                    if parts.is_empty() || pending.is_some() {
                        return Err(self.unsupported());
                    }
                    self.pos += 1;
                    pending = Some(SelectorCombinator::Child);
                    continue;
                }
                Some(b'+' | b'~') => return Err(self.unsupported()),
                Some(_) => {}
            }

            let step = self.parse_compound()?;
            let combinator = if parts.is_empty() {
                None
            } else {
                Some(pending.take().unwrap_or(SelectorCombinator::Descendant))
            };
            parts.push(SelectorPart { step, combinator });
        }

        if parts.is_empty() || pending.is_some() {
            return Err(self.unsupported());
        }
        Ok(parts)
    }

    fn parse_compound(&mut self) -> Result<SelectorStep> {
        let start = self.pos;
        let mut step = SelectorStep::default();
        loop {
            match self.peek() {
                Some(b'*') if self.pos == start => {
                    self.pos += 1;
                    step.universal = true;
                }
                Some(b'#') => {
                    self.pos += 1;
                    let id = self.ident()?;
                    if step.id.replace(id).is_some() {
                        return Err(self.unsupported());
                    }
                }
                Some(b'.') => {
                    self.pos += 1;
                    let class_name = self.ident()?;
                    step.classes.push(class_name);
                }
                Some(b'[') => {
                    self.pos += 1;
                    let condition = self.attr_condition()?;
                    step.attrs.push(condition);
                }
                Some(b':') => {
                    self.pos += 1;
                    let pseudo = self.pseudo_class()?;
                    step.pseudo_classes.push(pseudo);
                }
                Some(b) if self.pos == start && is_ident_char(b) => {
                    step.tag = Some(self.ident()?.to_ascii_lowercase());
                }
                None | Some(b'>' | b',' | b')' | b'+' | b'~') => break,
                Some(b) if b.is_ascii_whitespace() => break,
                Some(_) => return Err(self.unsupported()),
            }
        }
        Ok(step)
    }

    fn ident(&mut self) -> Result<String> {
        let ident = self.take_while(is_ident_char).to_string();
        if ident.is_empty() {
            return Err(self.unsupported());
        }
        Ok(ident)
    }

    fn attr_condition(&mut self) -> Result<SelectorAttrCondition> {
        self.skip_ws();
        let key = self
            .take_while(|b| is_ident_char(b) || b == b':')
            .to_ascii_lowercase();
        if key.is_empty() {
            return Err(self.unsupported());
        }
        self.skip_ws();

        let op = match self.peek() {
            Some(b']') => {
                self.pos += 1;
                return Ok(SelectorAttrCondition::Exists { key });
            }
            Some(b'=') => {
                self.pos += 1;
                b'='
            }
            Some(op @ (b'^' | b'$' | b'*'))
                if self.src.as_bytes().get(self.pos + 1) == Some(&b'=') =>
            {
                self.pos += 2;
                op
            }
            _ => return Err(self.unsupported()),
        };

        self.skip_ws();
        let value = self.attr_value()?;
        self.skip_ws();
        if !self.eat(b']') {
            return Err(self.unsupported());
        }

        Ok(match op {
            b'^' => SelectorAttrCondition::StartsWith { key, value },
            b'$' => SelectorAttrCondition::EndsWith { key, value },
            b'*' => SelectorAttrCondition::Contains { key, value },
            _ => SelectorAttrCondition::Eq { key, value },
        })
    }

    fn attr_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let value = self.take_while(|b| b != quote).to_string();
                if !self.eat(quote) {
                    return Err(self.unsupported());
                }
                Ok(value)
            }
            Some(_) => Ok(self
                .take_while(|b| !b.is_ascii_whitespace() && b != b']')
                .to_string()),
            None => Err(self.unsupported()),
        }
    }

    fn pseudo_class(&mut self) -> Result<SelectorPseudoClass> {
        match self.ident()?.as_str() {
            "first-child" => Ok(SelectorPseudoClass::FirstChild),
            "last-child" => Ok(SelectorPseudoClass::LastChild),
            "not" if self.eat(b'(') => Ok(SelectorPseudoClass::Not(self.parse_list(Some(b')'))?)),
            _ => Err(self.unsupported()),
        }
    }
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}
