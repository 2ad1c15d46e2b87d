//! Word-boundary identifier scanning with line-context classification.
//!
//! The finder produces every occurrence of a name within a file's text in
//! document order, classified by how the line uses it: a `def`/`class`
//! header, an assignment target, an import binding, or a plain read. This is
//! deliberately textual; anything that needs real scope resolution belongs
//! to a smarter engine behind the same interface.

use std::collections::BTreeSet;

/// A located match of an identifier, classified by how it is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Byte offset of the identifier's first character.
    pub offset: usize,
    /// The name is introduced by a `def` or `class` header.
    pub is_definition: bool,
    /// The name is bound here (assignment target or import binding).
    pub is_write: bool,
    /// The name is merely referenced.
    pub is_read: bool,
    /// The occurrence sits on an import statement.
    pub is_import: bool,
}

impl Occurrence {
    fn definition(offset: usize) -> Self {
        Occurrence {
            offset,
            is_definition: true,
            is_write: false,
            is_read: false,
            is_import: false,
        }
    }

    fn write(offset: usize, is_import: bool) -> Self {
        Occurrence {
            offset,
            is_definition: false,
            is_write: true,
            is_read: false,
            is_import,
        }
    }

    fn read(offset: usize, is_import: bool) -> Self {
        Occurrence {
            offset,
            is_definition: false,
            is_write: false,
            is_read: true,
            is_import,
        }
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Find every word-bounded occurrence of `name` in `text`, document order.
pub fn find_occurrences(text: &str, name: &str) -> Vec<Occurrence> {
    let mut found = Vec::new();
    if name.is_empty() {
        return found;
    }

    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(pos) = text[from..].find(name) {
        let offset = from + pos;
        from = offset + name.len();

        let bounded_left = offset == 0 || !is_ident_byte(bytes[offset - 1]);
        let end = offset + name.len();
        let bounded_right = end >= bytes.len() || !is_ident_byte(bytes[end]);

        if bounded_left && bounded_right {
            found.push(classify(text, offset, name));
        }
    }

    found
}

/// Expand `offset` to the identifier containing it, if any.
pub fn identifier_at(text: &str, offset: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    if offset >= bytes.len() || !is_ident_byte(bytes[offset]) {
        return None;
    }

    let mut start = offset;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset + 1;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }

    // Identifiers cannot start with a digit; the offset was inside a number.
    if bytes[start].is_ascii_digit() {
        return None;
    }

    Some((start, end))
}

/// Every distinct identifier appearing in `text`, for suggestion ranking.
pub fn identifiers(text: &str) -> BTreeSet<String> {
    let bytes = text.as_bytes();
    let mut names = BTreeSet::new();
    let mut i = 0;
    while i < bytes.len() {
        if is_ident_byte(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            if !bytes[start].is_ascii_digit() {
                names.insert(text[start..i].to_string());
            }
        } else {
            i += 1;
        }
    }
    names
}

fn classify(text: &str, offset: usize, name: &str) -> Occurrence {
    let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());

    let before = &text[line_start..offset];
    let after = &text[offset + name.len()..line_end];
    let line = text[line_start..line_end].trim_start();

    if line.starts_with("import ") || line.starts_with("from ") {
        return classify_on_import_line(offset, before, after);
    }

    let head = before.trim();
    if head == "def" || head == "async def" || head == "class" {
        return Occurrence::definition(offset);
    }

    if head.is_empty() {
        if is_assignment_tail(after) {
            return Occurrence::write(offset, false);
        }
        return Occurrence::read(offset, false);
    }

    Occurrence::read(offset, false)
}

/// Does the rest of the line make the preceding name an assignment target?
fn is_assignment_tail(after: &str) -> bool {
    let tail = after.trim_start();
    let mut chars = tail.chars();
    match chars.next() {
        Some('=') => chars.next() != Some('='),
        // Annotated assignment: `name: Type = value`.
        Some(':') => tail.contains('='),
        // Augmented assignment still binds the name.
        Some(c) if "+-*/%&|^@".contains(c) => chars.next() == Some('='),
        _ => false,
    }
}

fn classify_on_import_line(offset: usize, before: &str, after: &str) -> Occurrence {
    let head = before.trim_start().trim_end();
    let tail = after.trim_start();

    // `from pkg import x` — the module position is a reference.
    if head == "from" {
        return Occurrence::read(offset, true);
    }

    // `pkg.sub` — a later segment of a dotted path.
    if head.ends_with('.') {
        return Occurrence::read(offset, true);
    }

    // `import pkg as alias` / `from pkg import x as alias` — the alias binds.
    if head.split_whitespace().next_back() == Some("as") {
        return Occurrence::write(offset, true);
    }

    // Names in the import list bind unless an alias follows them.
    let in_list = head.ends_with("import") || head.ends_with(',');
    if in_list {
        if tail.split_whitespace().next() == Some("as") {
            return Occurrence::read(offset, true);
        }
        return Occurrence::write(offset, true);
    }

    Occurrence::read(offset, true)
}
