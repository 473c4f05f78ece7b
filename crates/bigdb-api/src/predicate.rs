// Path predicate rendering
//
// Turns key/value match conditions into the bracketed predicate syntax
// appended to a path segment: `switch[name='leaf1'][dpid=12]`.

use std::fmt;

/// Translate a field-style name into its path-segment form (`_` → `-`).
pub fn translate(name: &str) -> String {
    name.replace('_', "-")
}

/// A literal value substituted into a predicate template.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    /// Render the literal the way the server expects it inside a predicate.
    ///
    /// Booleans are quoted lowercase strings (the schema stores them as
    /// strings), strings are repr-quoted, numbers are bare.
    pub fn encode(&self) -> String {
        match self {
            Self::Str(s) => quote(s),
            Self::Int(i) => i.to_string(),
            Self::UInt(u) => u.to_string(),
            Self::Float(f) => float_repr(*f),
            Self::Bool(true) => "'true'".into(),
            Self::Bool(false) => "'false'".into(),
        }
    }
}

/// Shortest round-trip digits, positional for exponents in `-4..16` and
/// scientific outside it (`1e+20`, `1.5e-07`). Non-finite values are
/// `nan`, `inf` and `-inf`.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    let sign = if f.is_sign_negative() { "-" } else { "" };
    if f.is_infinite() {
        return format!("{sign}inf");
    }

    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits = mantissa.replace('.', "");

    if (-4..16).contains(&exp) {
        if exp < 0 {
            let zeros = "0".repeat(exp.unsigned_abs() as usize - 1);
            return format!("{sign}0.{zeros}{digits}");
        }
        let int_len = exp as usize + 1;
        if digits.len() <= int_len {
            let pad = "0".repeat(int_len - digits.len());
            format!("{sign}{digits}{pad}.0")
        } else {
            let (int, frac) = digits.split_at(int_len);
            format!("{sign}{int}.{frac}")
        }
    } else {
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{mantissa}e{exp_sign}{:02}", exp.unsigned_abs())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for Literal {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Literal {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Literal {
            fn from(value: $t) -> Self {
                Self::Int(i64::from(value))
            }
        }
    )*};
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Literal {
            fn from(value: $t) -> Self {
                Self::UInt(u64::from(value))
            }
        }
    )*};
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

/// Repr-style quoting: single quotes unless the string holds a single
/// quote and no double quote.
fn quote(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

/// A predicate template plus its named substitutions.
///
/// Placeholders are `$name` or `${name}`; `$$` renders a literal `$`.
/// Placeholders without a substitution are left untouched, so rendering
/// never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    template: String,
    substitutions: Vec<(String, Literal)>,
}

impl Predicate {
    pub fn new<I, K, V>(template: impl Into<String>, substitutions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Literal>,
    {
        Self {
            template: template.into(),
            substitutions: substitutions
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_owned(), v.into()))
                .collect(),
        }
    }

    /// Single-field equality: `<translated key>=<literal>`.
    pub fn equals(key: &str, value: impl Into<Literal>) -> Self {
        Self::new(format!("{}=$x", translate(key)), [("x", value)])
    }

    /// The substituted template, without brackets.
    pub fn expression(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
                continue;
            }

            let (name, tail) = if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) if identifier_len(&braced[..end]) == end => {
                        (&braced[..end], &braced[end + 1..])
                    }
                    _ => ("", after),
                }
            } else {
                let len = identifier_len(after);
                (&after[..len], &after[len..])
            };

            match self.lookup(name) {
                Some(literal) if !name.is_empty() => {
                    out.push_str(&literal.encode());
                    rest = tail;
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// The bracketed predicate, ready to append to a path segment.
    pub fn render(&self) -> String {
        format!("[{}]", self.expression())
    }

    fn lookup(&self, name: &str) -> Option<&Literal> {
        self.substitutions
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Length in bytes of the leading identifier (`[A-Za-z_][A-Za-z0-9_]*`).
fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}
