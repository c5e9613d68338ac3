use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::error::ParseError;
use crate::registry::{TypeId, TypeKind};
use crate::value::Value;

/// Fixed escape set recognized after a leading backslash in character input.
static CHAR_UNESCAPE: Lazy<HashMap<char, char>> = Lazy::new(|| {
    HashMap::from([
        ('0', '\0'),
        ('n', '\n'),
        ('r', '\r'),
        ('t', '\t'),
        ('b', '\u{8}'),
        ('f', '\u{c}'),
        ('\\', '\\'),
    ])
});

/// Parse user-entered text into a primitive value of the given kind.
/// A parse failure is always an error, never a silent default.
pub fn parse_primitive(kind: &TypeKind, text: &str) -> Result<Value, ParseError> {
    match kind {
        TypeKind::Bool => text
            .parse()
            .map(Value::Bool)
            .map_err(|_| invalid("bool", text)),
        TypeKind::I8 => text.parse().map(Value::I8).map_err(|_| invalid("i8", text)),
        TypeKind::I16 => text
            .parse()
            .map(Value::I16)
            .map_err(|_| invalid("i16", text)),
        TypeKind::I32 => text
            .parse()
            .map(Value::I32)
            .map_err(|_| invalid("i32", text)),
        TypeKind::I64 => text
            .parse()
            .map(Value::I64)
            .map_err(|_| invalid("i64", text)),
        TypeKind::F32 => text
            .parse()
            .map(Value::F32)
            .map_err(|_| invalid("f32", text)),
        TypeKind::F64 => text
            .parse()
            .map(Value::F64)
            .map_err(|_| invalid("f64", text)),
        TypeKind::Char => parse_char(text).map(Value::Char),
        _ => Err(ParseError::NotParseable(format!("{kind:?}"))),
    }
}

/// Character input: a backslash followed by exactly one more character is an
/// escape from the fixed set; anything else yields its first character
/// verbatim.
pub fn parse_char(text: &str) -> Result<char, ParseError> {
    let mut chars = text.chars();
    let first = chars.next().ok_or(ParseError::EmptyChar)?;
    if first == '\\' {
        if let Some(second) = chars.next() {
            if chars.next().is_none() {
                return CHAR_UNESCAPE
                    .get(&second)
                    .copied()
                    .ok_or(ParseError::UnknownEscape(second));
            }
        }
    }
    Ok(first)
}

fn invalid(kind: &'static str, text: &str) -> ParseError {
    ParseError::Invalid {
        kind,
        text: text.to_string(),
    }
}

type TextParser = Rc<dyn Fn(&str) -> Result<Value, ParseError>>;

/// Per-session table of custom text-to-value mappings, keyed by type. The
/// built-in text type gets an identity mapping by default.
pub struct ParserTable {
    parsers: HashMap<TypeId, TextParser>,
}

impl ParserTable {
    pub fn new(text_type: TypeId) -> Self {
        let mut parsers: HashMap<TypeId, TextParser> = HashMap::new();
        parsers.insert(text_type, Rc::new(|text| Ok(Value::text(text))));
        ParserTable { parsers }
    }

    pub fn register(
        &mut self,
        ty: TypeId,
        parser: impl Fn(&str) -> Result<Value, ParseError> + 'static,
    ) {
        self.parsers.insert(ty, Rc::new(parser));
    }

    pub fn contains(&self, ty: TypeId) -> bool {
        self.parsers.contains_key(&ty)
    }

    pub fn parse(&self, ty: TypeId, text: &str) -> Option<Result<Value, ParseError>> {
        self.parsers.get(&ty).map(|parser| parser(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_integers() {
        assert_eq!(
            parse_primitive(&TypeKind::I32, "7").unwrap().as_i32(),
            Some(7)
        );
        assert_eq!(
            parse_primitive(&TypeKind::I64, "-3").unwrap().as_i64(),
            Some(-3)
        );
        assert!(matches!(
            parse_primitive(&TypeKind::I32, "x"),
            Err(ParseError::Invalid { kind: "i32", .. })
        ));
    }

    #[test]
    fn test_parse_bool_and_floats() {
        assert_eq!(
            parse_primitive(&TypeKind::Bool, "true").unwrap().as_bool(),
            Some(true)
        );
        assert_eq!(
            parse_primitive(&TypeKind::F64, "1.5").unwrap().as_f64(),
            Some(1.5)
        );
        assert!(parse_primitive(&TypeKind::Bool, "yes").is_err());
    }

    #[test]
    fn test_parse_char_escapes() {
        assert_eq!(parse_char("\\n").unwrap(), '\n');
        assert_eq!(parse_char("\\0").unwrap(), '\0');
        assert_eq!(parse_char("\\t").unwrap(), '\t');
        assert_eq!(parse_char("\\\\").unwrap(), '\\');
        assert_eq!(parse_char("\\b").unwrap(), '\u{8}');
        assert_eq!(parse_char("\\f").unwrap(), '\u{c}');
    }

    #[test]
    fn test_parse_char_verbatim_and_errors() {
        assert_eq!(parse_char("x").unwrap(), 'x');
        assert_eq!(parse_char("xyz").unwrap(), 'x');
        // A lone backslash is the backslash character itself.
        assert_eq!(parse_char("\\").unwrap(), '\\');
        // Backslash plus more than one character is not an escape.
        assert_eq!(parse_char("\\nx").unwrap(), '\\');
        assert_eq!(parse_char("\\q"), Err(ParseError::UnknownEscape('q')));
        assert_eq!(parse_char(""), Err(ParseError::EmptyChar));
    }

    #[test]
    fn test_parser_table_default_text_identity() {
        let text_type = TypeId(9);
        let table = ParserTable::new(text_type);

        assert!(table.contains(text_type));
        let parsed = table.parse(text_type, "hello").unwrap().unwrap();
        assert_eq!(parsed.as_text().unwrap(), "hello");
        assert!(table.parse(TypeId(0), "hello").is_none());
    }
}
