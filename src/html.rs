use super::*;

/// Builds a [`Dom`] from server-rendered markup.
///
/// Template output is rarely tidy, so the builder recovers the way browsers
/// do: `</option>`, `</li>` and `</p>` may be left out, end tags without an
/// open element are dropped, and a `<` that does not start a tag is text.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut cursor = Cursor::new(html);
    let mut builder = TreeBuilder::new();

    while !cursor.at_end() {
        if cursor.eat("<!--") {
            cursor
                .skip_past("-->")
                .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
        } else if cursor.at_markup() {
            if cursor.eat("</") {
                let tag = cursor.end_tag_name()?;
                builder.close(&tag);
            } else if cursor.eat("<!") {
                cursor.skip_declaration()?;
            } else {
                let tag = cursor.start_tag()?;
                builder.open(&mut cursor, tag)?;
            }
        } else {
            let text = cursor.text_run();
            builder.text(decode_character_references(text));
        }
    }

    Ok(builder.finish())
}

#[derive(Debug)]
struct StartTag {
    name: String,
    attrs: HashMap<String, String>,
    self_closing: bool,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        self.src.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            return true;
        }
        false
    }

    fn skip_past(&mut self, token: &str) -> Option<()> {
        let at = self.rest().find(token)?;
        self.pos += at + token.len();
        Some(())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consumes ASCII bytes accepted by `accept`.
    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii() && accept(b)) {
            self.pos += 1;
        }
        self.src.get(start..self.pos).unwrap_or_default()
    }

    fn at_markup(&self) -> bool {
        let bytes = self.src.as_bytes();
        bytes.get(self.pos) == Some(&b'<')
            && bytes
                .get(self.pos + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/' || *b == b'!')
    }

    fn at_tag_close(&self) -> bool {
        matches!(self.peek(), Some(b'>')) || self.rest().starts_with("/>")
    }

    /// Text up to the next `<`. The first byte is always taken, so a stray
    /// `<` ends up in the text.
    fn text_run(&mut self) -> &'a str {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(|b| b != b'<') {
            self.pos += 1;
        }
        self.src.get(start..self.pos).unwrap_or_default()
    }

    fn end_tag_name(&mut self) -> Result<String> {
        self.skip_ws();
        let tag = self.take_while(is_tag_char).to_ascii_lowercase();
        self.skip_past(">")
            .ok_or_else(|| Error::HtmlParse(format!("unclosed </{tag}>")))?;
        Ok(tag)
    }

    fn skip_declaration(&mut self) -> Result<()> {
        let mut quote = None;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => return Ok(()),
                None => {}
            }
        }
        Err(Error::HtmlParse("unclosed declaration".into()))
    }

    fn start_tag(&mut self) -> Result<StartTag> {
        self.pos += 1;
        let name = self.take_while(is_tag_char).to_ascii_lowercase();
        let mut attrs = HashMap::new();

        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(Error::HtmlParse(format!("unclosed <{name}> start tag"))),
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(StartTag {
                        name,
                        attrs,
                        self_closing: false,
                    });
                }
                _ if self.eat("/>") => {
                    return Ok(StartTag {
                        name,
                        attrs,
                        self_closing: true,
                    });
                }
                Some(b) if is_attr_name_char(b) => {
                    let attr = self.take_while(is_attr_name_char).to_ascii_lowercase();
                    self.skip_ws();
                    let value = if self.eat("=") {
                        self.skip_ws();
                        self.attr_value()?
                    } else {
                        String::new()
                    };
                    // first occurrence wins
                    attrs.entry(attr).or_insert(value);
                }
                Some(_) => self.skip_unquoted(),
            }
        }
    }

    fn skip_unquoted(&mut self) {
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && !self.at_tag_close())
        {
            self.pos += 1;
        }
    }

    fn attr_value(&mut self) -> Result<String> {
        let raw = match self.peek() {
            None => return Err(Error::HtmlParse("missing attribute value".into())),
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|b| b != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
                }
                let raw = self.src.get(start..self.pos).unwrap_or_default();
                self.pos += 1;
                raw
            }
            Some(_) => {
                let start = self.pos;
                self.skip_unquoted();
                self.src.get(start..self.pos).unwrap_or_default()
            }
        };
        Ok(decode_character_references(raw))
    }

    /// Body of a raw text element up to its end tag, which is consumed.
    fn raw_text(&mut self, tag: &str) -> Result<&'a str> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut from = 0usize;
        while let Some(found) = rest.get(from..).and_then(|tail| tail.find("</")) {
            let at = from + found;
            let mut name_start = at + 2;
            while bytes.get(name_start).is_some_and(u8::is_ascii_whitespace) {
                name_start += 1;
            }
            let name_end = name_start + tag.len();
            let is_end_tag = bytes
                .get(name_start..name_end)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag.as_bytes()))
                && !bytes.get(name_end).is_some_and(u8::is_ascii_alphanumeric);
            if is_end_tag {
                self.pos += at + 2;
                self.end_tag_name()?;
                return Ok(rest.get(..at).unwrap_or_default());
            }
            from = at + 2;
        }
        Err(Error::HtmlParse(format!("unclosed <{tag}>")))
    }
}

/// An end tag the parser inserts when a start tag arrives while `closes` is
/// still open, unless one of `scope` is open in between.
struct ImpliedEnd {
    closes: &'static str,
    scope: &'static [&'static str],
}

fn implied_end(start_tag: &str) -> Option<ImpliedEnd> {
    match start_tag {
        "li" => Some(ImpliedEnd {
            closes: "li",
            scope: &["ol", "ul", "menu"],
        }),
        "option" | "optgroup" => Some(ImpliedEnd {
            closes: "option",
            scope: &["optgroup", "select", "datalist"],
        }),
        "address" | "article" | "aside" | "div" | "dl" | "fieldset" | "footer" | "form" | "h1"
        | "h2" | "h3" | "h4" | "h5" | "h6" | "header" | "hr" | "main" | "nav" | "ol" | "p"
        | "pre" | "section" | "table" | "ul" => Some(ImpliedEnd {
            closes: "p",
            scope: &["button", "table", "td", "th", "template"],
        }),
        _ => None,
    }
}

struct TreeBuilder {
    dom: Dom,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let dom = Dom::new();
        let open = vec![dom.root];
        Self { dom, open }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.dom.root)
    }

    fn open(&mut self, cursor: &mut Cursor<'_>, tag: StartTag) -> Result<()> {
        self.close_implied(&tag.name);
        let parent = self.current();
        let node = self.dom.create_element(parent, tag.name.clone(), tag.attrs);

        if tag.self_closing || is_void_tag(&tag.name) {
            return Ok(());
        }
        if matches!(tag.name.as_str(), "script" | "style" | "textarea" | "title") {
            let body = cursor.raw_text(&tag.name)?;
            if !body.is_empty() {
                // textarea and title still decode character references
                let body = if matches!(tag.name.as_str(), "textarea" | "title") {
                    decode_character_references(body)
                } else {
                    body.to_string()
                };
                self.dom.create_text(node, body);
            }
            return Ok(());
        }
        self.open.push(node);
        Ok(())
    }

    fn close_implied(&mut self, start_tag: &str) {
        let Some(rule) = implied_end(start_tag) else {
            return;
        };
        for depth in (1..self.open.len()).rev() {
            let Some(open_tag) = self.dom.tag_name(self.open[depth]) else {
                continue;
            };
            if open_tag == rule.closes {
                self.open.truncate(depth);
                return;
            }
            if rule.scope.contains(&open_tag) {
                return;
            }
        }
    }

    fn close(&mut self, tag: &str) {
        let root = self.dom.root;
        let Some(depth) = self
            .open
            .iter()
            .rposition(|node| *node != root && self.dom.is_tag(*node, tag))
        else {
            return;
        };
        self.open.truncate(depth);
    }

    fn text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        self.dom.create_text(parent, text);
    }

    fn finish(mut self) -> Dom {
        self.dom.rebuild_id_index();
        self.dom
    }
}

fn decode_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#')
            .count();
        match character_reference(&after[..len]) {
            Some(ch) => {
                out.push(ch);
                let tail = &after[len..];
                rest = tail.strip_prefix(';').unwrap_or(tail);
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn character_reference(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "middot" => '\u{b7}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        _ => return None,
    };
    Some(ch)
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'@' | b'.')
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_form_markup_with_implied_option_ends() -> Result<()> {
        let dom = parse_html(
            r#"<form id="f"><select name="form-0-country"><option value="1">Nigeria<option value="2" selected>Ghana</select></form>"#,
        )?;
        let select = dom
            .query_selector("select")?
            .ok_or_else(|| Error::SelectorNotFound("select".into()))?;
        assert_eq!(dom.select_options(select).len(), 2);
        assert_eq!(dom.value(select)?, "2");
        Ok(())
    }

    #[test]
    fn decodes_character_references_in_text_and_attributes() -> Result<()> {
        let dom = parse_html(r#"<p id="x" title="a &amp; b">Tom &amp; Jerry &#169;</p>"#)?;
        let p = dom
            .by_id("x")
            .ok_or_else(|| Error::SelectorNotFound("#x".into()))?;
        assert_eq!(dom.attr(p, "title").as_deref(), Some("a & b"));
        assert_eq!(dom.text_content(p), "Tom & Jerry ©");
        Ok(())
    }

    #[test]
    fn bare_less_than_in_text_is_kept() -> Result<()> {
        let dom = parse_html("<p id='x'>1 < 2</p>")?;
        let p = dom
            .by_id("x")
            .ok_or_else(|| Error::SelectorNotFound("#x".into()))?;
        assert_eq!(dom.text_content(p), "1 < 2");
        Ok(())
    }

    #[test]
    fn unclosed_comment_is_a_parse_error() {
        assert!(matches!(
            parse_html("<div><!-- never closed"),
            Err(Error::HtmlParse(_))
        ));
    }

    #[test]
    fn paragraph_is_closed_by_a_following_block() -> Result<()> {
        let dom = parse_html("<div id='c'><p>one<div id='d'>two</div></div>")?;
        let c = dom
            .by_id("c")
            .ok_or_else(|| Error::SelectorNotFound("#c".into()))?;
        assert_eq!(dom.child_elements(c).len(), 2);
        Ok(())
    }
}
