use super::*;

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title"];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Parses markup into a fresh arena whose document node holds the top-level
/// nodes. Used both for whole documents and for `innerHTML` fragments.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut parser = HtmlParser::new(html);
    parser.run()?;
    Ok(parser.dom)
}

struct HtmlParser<'a> {
    src: &'a str,
    pos: usize,
    dom: Dom,
    // Open elements; the document node stays at the bottom.
    open: Vec<NodeId>,
}

impl<'a> HtmlParser<'a> {
    fn new(src: &'a str) -> Self {
        let dom = Dom::new();
        let open = vec![dom.root];
        Self {
            src,
            pos: 0,
            dom,
            open,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.dom.root)
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !accept(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(|c| c.is_ascii_whitespace());
    }

    fn run(&mut self) -> Result<()> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if let Some(comment) = rest.strip_prefix("<!--") {
                let end = comment
                    .find("-->")
                    .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
                self.pos += "<!--".len() + end + "-->".len();
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                // Doctype and processing instructions carry no nodes.
                let end = rest
                    .find('>')
                    .ok_or_else(|| Error::HtmlParse("unclosed markup declaration".into()))?;
                self.pos += end + 1;
            } else if rest.starts_with("</") {
                let tag = self.end_tag()?;
                self.close(&tag);
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.start_tag()?;
            } else {
                // A `<` that opens no tag is plain text.
                let skip = usize::from(rest.starts_with('<'));
                let len = rest[skip..].find('<').map_or(rest.len(), |at| at + skip);
                let text = decode_character_references(&rest[..len]);
                let parent = self.parent();
                self.dom.create_text(parent, text);
                self.pos += len;
            }
        }
        Ok(())
    }

    fn start_tag(&mut self) -> Result<()> {
        self.pos += 1;
        let tag = self.take_while(is_name_char).to_ascii_lowercase();

        let mut attrs = BTreeMap::new();
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(Error::HtmlParse(format!("unclosed start tag <{tag}>")));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }

            let name = self
                .take_while(|c| is_name_char(c) || c == ':')
                .to_ascii_lowercase();
            if name.is_empty() {
                return Err(Error::HtmlParse(format!(
                    "invalid attribute name in <{tag}>"
                )));
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                decode_character_references(self.attribute_value()?)
            } else {
                String::new()
            };
            // First occurrence wins.
            attrs.entry(name).or_insert(value);
        };

        let parent = self.parent();
        let node = self.dom.create_element(parent, tag.clone(), attrs);

        if self_closing {
            return Ok(());
        }
        if RAW_TEXT_TAGS.contains(&tag.as_str()) {
            return self.raw_text(node, &tag);
        }
        if !is_void_tag(&tag) {
            self.open.push(node);
        }
        Ok(())
    }

    fn attribute_value(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let Some(quote) = rest.chars().next().filter(|c| matches!(c, '"' | '\'')) else {
            let mut value = self.take_while(|c| !c.is_ascii_whitespace() && c != '>');
            // `<img src=a.png/>`: the slash closes the tag.
            if value.len() > 1 && value.ends_with('/') && self.rest().starts_with('>') {
                value = &value[..value.len() - 1];
                self.pos -= 1;
            }
            if value.is_empty() {
                return Err(Error::HtmlParse("missing attribute value".into()));
            }
            return Ok(value);
        };

        let body = &rest[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| Error::HtmlParse("unclosed quoted attribute value".into()))?;
        self.pos += end + 2;
        Ok(&body[..end])
    }

    fn raw_text(&mut self, node: NodeId, tag: &str) -> Result<()> {
        let rest = self.rest();
        let close = rest
            .to_ascii_lowercase()
            .find(&format!("</{tag}"))
            .ok_or_else(|| Error::HtmlParse(format!("unclosed <{tag}>")))?;
        let body = &rest[..close];
        if !body.is_empty() {
            let text = match tag {
                "textarea" | "title" => decode_character_references(body),
                _ => body.to_string(),
            };
            self.dom.create_text(node, text);
        }
        self.pos += close;
        self.end_tag()?;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<String> {
        let rest = self.rest();
        let close = rest
            .find('>')
            .ok_or_else(|| Error::HtmlParse("unclosed end tag".into()))?;
        self.pos += close + 1;
        Ok(rest[2..close].trim().to_ascii_lowercase())
    }

    /// Pops up to and including the nearest open `tag`; stray end tags are
    /// ignored.
    fn close(&mut self, tag: &str) {
        let found = self
            .open
            .iter()
            .rposition(|node| *node != self.dom.root && self.dom.tag_name(*node) == Some(tag));
        if let Some(depth) = found {
            self.open.truncate(depth);
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn decode_character_references(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decodes the `&...;` reference at the start of `src` into the character and
/// the number of bytes it spans.
fn decode_reference(src: &str) -> Option<(char, usize)> {
    let end = src.find(';')?;
    let name = &src[1..end];
    let ch = match name.strip_prefix('#') {
        Some(numeric) => {
            let code = match numeric.strip_prefix('x').or_else(|| numeric.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)?
        }
        None => match name {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{00A0}',
            _ => return None,
        },
    };
    Some((ch, end + 1))
}
