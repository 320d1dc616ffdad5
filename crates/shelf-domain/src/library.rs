//! Reading and writing the `<library>` descriptor served by the indexing service.

use std::fmt::Write as _;

use anyhow::{bail, Result};

pub const XML_DECLARATION: &str = "<?xml version='1.0' encoding='utf-8'?>";

/// One `<book/>` element; attribute order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    attributes: Vec<(String, String)>,
}

impl Book {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    fn render(&self, out: &mut String) {
        out.push_str("<book");
        for (key, value) in &self.attributes {
            let _ = write!(out, " {key}=\"{}\"", escape(value));
        }
        out.push_str("/>");
    }
}

/// Renders a full descriptor; no books yields `<library/>`.
#[must_use]
pub fn render_library(books: &[Book]) -> String {
    let mut out = String::from(XML_DECLARATION);
    out.push('\n');
    if books.is_empty() {
        out.push_str("<library/>");
        return out;
    }
    out.push_str("<library>");
    for book in books {
        out.push_str("\n  ");
        book.render(&mut out);
    }
    out.push_str("\n</library>");
    out
}

/// Collects every `<book>` element of a descriptor.
///
/// Only attributes are kept; child elements of a book are dropped. Comments
/// and CDATA sections are skipped, so a commented-out book is not a book.
pub fn parse_books(contents: &str) -> Result<Vec<Book>> {
    let mut books = Vec::new();
    let mut cursor = contents;
    while let Some(start) = cursor.find('<') {
        let tag = &cursor[start..];
        if let Some(comment) = tag.strip_prefix("<!--") {
            cursor = skip_past(comment, "-->", "comment")?;
        } else if let Some(cdata) = tag.strip_prefix("<![CDATA[") {
            cursor = skip_past(cdata, "]]>", "CDATA section")?;
        } else if let Some(after) = tag.strip_prefix("<book").filter(|after| {
            after
                .chars()
                .next()
                .is_some_and(|ch| ch.is_whitespace() || ch == '/' || ch == '>')
        }) {
            let (book, rest) = parse_attributes(after)?;
            books.push(book);
            cursor = rest;
        } else {
            cursor = &tag[1..];
        }
    }
    Ok(books)
}

fn skip_past<'a>(input: &'a str, terminator: &str, what: &str) -> Result<&'a str> {
    match input.find(terminator) {
        Some(end) => Ok(&input[end + terminator.len()..]),
        None => bail!("unterminated {what}"),
    }
}

fn parse_attributes(mut input: &str) -> Result<(Book, &str)> {
    let mut book = Book::default();
    loop {
        input = input.trim_start();
        if let Some(rest) = input.strip_prefix("/>") {
            return Ok((book, rest));
        }
        if let Some(rest) = input.strip_prefix('>') {
            return Ok((book, rest));
        }
        let Some(eq) = input.find('=') else {
            bail!("unterminated <book> element");
        };
        let name = input[..eq].trim();
        if name.is_empty() || name.contains(|ch: char| ch.is_whitespace() || ch == '<' || ch == '>') {
            bail!("malformed attribute name near '{}'", &input[..eq]);
        }
        let value_part = input[eq + 1..].trim_start();
        let Some(quote) = value_part.chars().next().filter(|ch| *ch == '"' || *ch == '\'') else {
            bail!("attribute '{name}' is not quoted");
        };
        let body = &value_part[1..];
        let Some(end) = body.find(quote) else {
            bail!("attribute '{name}' is not terminated");
        };
        book.attributes.push((name.to_string(), unescape(&body[..end])));
        input = &body[end + 1..];
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
