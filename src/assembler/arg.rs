//! Numeric/string literal parsing and the argument classifier.
//!
//! One textual argument is classified into a tagged [`Arg`] by trying,
//! in order, dereference, register, number, and address parses, keeping
//! the first that fully resolves (or the last one's "shape known, value
//! pending" result if none do). This mirrors the Python original's
//! `Arg.parse` / `_attempt_several_parses` dispatch chain.

use std::sync::LazyLock;

use bitflags::bitflags;
use regex::Regex;

use super::context::Context;
use super::error::Error;
use super::op::Op;

/// Matches a bare label name: `[_A-Za-z][_A-Za-z0-9]*`.
pub static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z][_A-Za-z0-9]*$").unwrap());

/// The resolved shape of an argument. At most one is set on a parsed
/// [`Arg`] — see [`KindMask`] for the flag-set used at call sites that
/// accept more than one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Number,
    Address,
    Register,
    DerefAddress,
    DerefRegister,
}

impl ArgKind {
    fn to_mask(self) -> KindMask {
        match self {
            ArgKind::Number => KindMask::NUMBER,
            ArgKind::Address => KindMask::ADDRESS,
            ArgKind::Register => KindMask::REGISTER,
            ArgKind::DerefAddress => KindMask::DEREF_ADDRESS,
            ArgKind::DerefRegister => KindMask::DEREF_REGISTER,
        }
    }
}

bitflags! {
    /// A set of acceptable [`ArgKind`]s, used at handler call sites that
    /// take e.g. "a register or a register dereference".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KindMask: u8 {
        const NUMBER         = 0b00001;
        const ADDRESS        = 0b00010;
        const REGISTER       = 0b00100;
        const DEREF_ADDRESS  = 0b01000;
        const DEREF_REGISTER = 0b10000;
    }
}

/// Parsing options that vary by architecture (and, for PALM's `move`,
/// by opcode): which register prefixes are recognized, and whether
/// fractional (half-step) crements are permitted in a dereference.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub register_prefixes: Vec<String>,
    pub fractional_crements: bool,
}

impl ParseOptions {
    pub fn new(register_prefixes: &[&str]) -> ParseOptions {
        ParseOptions {
            register_prefixes: register_prefixes.iter().map(|s| s.to_string()).collect(),
            fractional_crements: false,
        }
    }

    pub fn with_fractional_crements(&self) -> ParseOptions {
        ParseOptions {
            register_prefixes: self.register_prefixes.clone(),
            fractional_crements: true,
        }
    }
}

/// One parsed (or pending) argument.
#[derive(Debug, Clone)]
pub struct Arg {
    pub stripped: String,
    pub kind: Option<ArgKind>,
    pub unresolved: bool,
    pub integer: i64,
    pub register_prefix: String,
    pub precrement: f64,
    pub postcrement: f64,
}

impl Arg {
    /// A freshly-lexed argument: shape and value both unknown.
    pub fn unparsed(stripped: impl Into<String>) -> Arg {
        Arg {
            stripped: stripped.into(),
            kind: None,
            unresolved: true,
            integer: 0,
            register_prefix: String::new(),
            precrement: 0.0,
            postcrement: 0.0,
        }
    }

    fn resolved(stripped: impl Into<String>, kind: ArgKind, integer: i64) -> Arg {
        Arg {
            stripped: stripped.into(),
            kind: Some(kind),
            unresolved: false,
            integer,
            register_prefix: String::new(),
            precrement: 0.0,
            postcrement: 0.0,
        }
    }

    fn pending(stripped: impl Into<String>, kind: ArgKind) -> Arg {
        Arg {
            stripped: stripped.into(),
            kind: Some(kind),
            unresolved: true,
            integer: 0,
            register_prefix: String::new(),
            precrement: 0.0,
            postcrement: 0.0,
        }
    }

    /// Already fully parsed (a base kind is known and no label is
    /// pending).
    pub fn is_resolved(&self) -> bool {
        self.kind.is_some() && !self.unresolved
    }

    /// Whether this argument's kind is in `mask`. An argument whose
    /// shape is still `None` (never attempted) matches nothing.
    pub fn matches(&self, mask: KindMask) -> bool {
        match self.kind {
            Some(k) => mask.contains(k.to_mask()),
            None => false,
        }
    }
}

/// Parse a number in any of the accepted forms (see the language
/// reference's `integer` grammar rule), or a one-character string
/// literal evaluated through `context.encode_str`.
pub fn parse_integer(context: &Context, t: &str) -> Result<i64, String> {
    if t.is_empty() {
        return Err("attempted to parse the empty string as an integer".to_string());
    }
    let original = t;

    if let Some(first) = t.chars().next() {
        if first == '"' || first == '\'' {
            let bytes = parse_delimited_string(context, t)?;
            if bytes.len() != 1 {
                return Err(
                    "only one-character strings may be used as integer literals".to_string(),
                );
            }
            return Ok(bytes[0] as i64);
        }
    }

    let mut t = t.to_lowercase();
    if let Some(rest) = t.strip_prefix('$') {
        t = format!("{}h", rest);
    }

    let (sign, rest) = match t.strip_prefix('+') {
        Some(rest) => (1i64, rest.to_string()),
        None => match t.strip_prefix('-') {
            Some(rest) => (-1i64, rest.to_string()),
            None => (1i64, t.clone()),
        },
    };
    let _ = &t;

    let (radix, digits): (u32, String) = if let Some(rest) = rest.strip_suffix('h') {
        (16, rest.to_string())
    } else if let Some(rest) = rest.strip_suffix('b') {
        (2, rest.to_string())
    } else if let Some(rest) = rest.strip_suffix('o') {
        (8, rest.to_string())
    } else if let Some(rest) = rest.strip_suffix('q') {
        (8, rest.to_string())
    } else if let Some(rest) = rest.strip_suffix('d') {
        (10, rest.to_string())
    } else if let Some(rest) = rest.strip_prefix("0x") {
        (16, rest.to_string())
    } else if let Some(rest) = rest.strip_prefix("0b") {
        (2, rest.to_string())
    } else if let Some(rest) = rest.strip_prefix("0o") {
        (8, rest.to_string())
    } else {
        (10, rest.clone())
    };

    i64::from_str_radix(&digits, radix)
        .map(|v| sign * v)
        .map_err(|_| format!("malformed numeric text {:?}", original))
}

/// Parse a `'`- or `"`-delimited string, honoring `\`-escaping of the
/// single following character, then run it through the architecture's
/// `encode_str`.
pub fn parse_delimited_string(context: &Context, t: &str) -> Result<Vec<u8>, String> {
    let chars: Vec<char> = t.chars().collect();
    if chars.len() < 2 || chars[0] != chars[chars.len() - 1] || (chars[0] != '\'' && chars[0] != '"') {
        return Err(format!("could not parse {:?} as a delimited string", t));
    }
    let inner = &chars[1..chars.len() - 1];
    let mut unescaped = String::new();
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == '\\' && i + 1 < inner.len() {
            unescaped.push(inner[i + 1]);
            i += 2;
        } else {
            unescaped.push(inner[i]);
            i += 1;
        }
    }
    (context.encode_str)(&unescaped)
}

fn parse_number(context: &Context, t: &str) -> Result<Arg, String> {
    if t.is_empty() {
        return Err("attempted to parse the empty string as a number".to_string());
    }
    let Some(tail) = t.strip_prefix('#') else {
        return Err(format!("malformed numerical value {:?}", t));
    };
    if let Ok(v) = parse_integer(context, tail) {
        return Ok(Arg::resolved(tail, ArgKind::Number, v));
    }
    if !LABEL_RE.is_match(tail) {
        return Err(format!("malformed numerical value {:?}", t));
    }
    match context.labels.get(tail) {
        Some(&addr) => Ok(Arg::resolved(t, ArgKind::Number, addr as i64)),
        None => Ok(Arg::pending(t, ArgKind::Number)),
    }
}

fn parse_address(context: &Context, t: &str) -> Result<Arg, String> {
    if t.is_empty() {
        return Err("attempted to parse the empty string as an address".to_string());
    }
    if let Ok(v) = parse_integer(context, t) {
        return Ok(Arg::resolved(t, ArgKind::Address, v));
    }
    if !LABEL_RE.is_match(t) {
        return Err(format!("malformed address {:?}", t));
    }
    match context.labels.get(t) {
        Some(&addr) => Ok(Arg::resolved(t, ArgKind::Address, addr as i64)),
        None => Ok(Arg::pending(t, ArgKind::Address)),
    }
}

fn parse_register(options: &ParseOptions, context: &Context, t: &str) -> Result<Arg, String> {
    if t.is_empty() {
        return Err("attempted to parse the empty string as a register specification".to_string());
    }
    let lowered = t.to_lowercase();

    let mut prefixes: Vec<&String> = options.register_prefixes.iter().collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
    let prefix = prefixes
        .into_iter()
        .find(|p| lowered.starts_with(p.as_str()))
        .ok_or_else(|| format!("register specification {:?} has an unknown prefix", t))?;

    let regnum_text = &lowered[prefix.len()..];
    let regnum = if regnum_text.is_empty() {
        -1
    } else {
        parse_integer(context, regnum_text)?
    };

    let mut arg = Arg::resolved(lowered.clone(), ArgKind::Register, regnum);
    arg.register_prefix = prefix.clone();
    Ok(arg)
}

fn parse_deref(options: &ParseOptions, context: &Context, t: &str) -> Result<Arg, String> {
    if t.is_empty() {
        return Err("attempted to parse the empty string as a dereference".to_string());
    }
    let stripped = t.trim().to_string();
    let chars: Vec<char> = stripped.chars().collect();
    let malformed = || format!("malformed dereference {:?}", t);

    let mut i = 0;
    let mut precrement = 0.0;
    loop {
        if i >= chars.len() {
            return Err(malformed());
        }
        let delta = match chars[i] {
            '-' => -1.0,
            '+' => 1.0,
            '~' if options.fractional_crements => -0.5,
            '\'' if options.fractional_crements => 0.5,
            _ => break,
        };
        precrement += delta;
        i += 1;
    }

    if chars.get(i) != Some(&'(') {
        return Err(malformed());
    }
    i += 1;

    let rest: String = chars[i..].iter().collect();
    let mut parts = rest.splitn(3, ')');
    let toderef_text = parts.next().ok_or_else(malformed)?;
    let remainder = match parts.next() {
        Some(r) => r,
        None => return Err(malformed()),
    };
    if parts.next().is_some() {
        return Err(malformed());
    }

    let toderef = parse_register(options, context, toderef_text)
        .or_else(|_| parse_address(context, toderef_text))
        .map_err(|_| malformed())?;

    let mut postcrement = 0.0;
    let remainder_chars: Vec<char> = remainder.chars().collect();
    let mut j = 0;
    while j < remainder_chars.len() && (remainder_chars[j] == '+' || remainder_chars[j] == '-') {
        postcrement += if remainder_chars[j] == '-' { -1.0 } else { 1.0 };
        j += 1;
    }
    if j != remainder_chars.len() {
        return Err(malformed());
    }

    let kind = if toderef.kind == Some(ArgKind::Register) {
        ArgKind::DerefRegister
    } else {
        ArgKind::DerefAddress
    };
    let unresolved = !toderef.is_resolved();
    Ok(Arg {
        stripped,
        kind: Some(kind),
        unresolved,
        integer: toderef.integer,
        register_prefix: String::new(),
        precrement,
        postcrement,
    })
}

/// Classify one textual argument: try dereference, register, number,
/// then address, in that order, returning the first fully-resolved
/// result, or the last "shape known, value pending" result if none
/// resolve. On total failure, returns each attempt's description and
/// error message.
fn classify(options: &ParseOptions, context: &Context, t: &str) -> Result<Arg, Vec<(&'static str, String)>> {
    let attempts: [(&'static str, Box<dyn Fn() -> Result<Arg, String>>); 4] = [
        ("as a dereference", Box::new(|| parse_deref(options, context, t))),
        ("as a register", Box::new(|| parse_register(options, context, t))),
        ("as a number", Box::new(|| parse_number(context, t))),
        ("as an address", Box::new(|| parse_address(context, t))),
    ];

    let mut errors = Vec::new();
    let mut last_pending: Option<Arg> = None;
    for (description, attempt) in attempts {
        match attempt() {
            Ok(arg) if arg.is_resolved() => return Ok(arg),
            Ok(arg) => last_pending = Some(arg),
            Err(e) => errors.push((description, e)),
        }
    }
    if let Some(arg) = last_pending {
        return Ok(arg);
    }
    Err(errors)
}

/// Parse every argument of `op`, one per entry in `kinds`. A mismatched
/// argument count or an argument whose classified kind isn't in the
/// corresponding mask is a hard [`Error`]; a label not yet bound is not
/// — it comes back `unresolved` for the driver to retry later.
pub fn parse_args_if_able(
    options: &ParseOptions,
    context: &Context,
    op: &Op,
    kinds: &[KindMask],
) -> Result<Vec<Arg>, Error> {
    if op.args.len() != kinds.len() {
        return Err(op.invalid_argument_count(&[kinds.len()]));
    }

    let mut out = Vec::with_capacity(op.args.len());
    for (i, arg) in op.args.iter().enumerate() {
        let parsed = if arg.is_resolved() {
            arg.clone()
        } else {
            match classify(options, context, &arg.stripped) {
                Ok(a) => a,
                Err(attempts) => {
                    let why = attempts
                        .iter()
                        .map(|(d, e)| format!("{}: {}", d, e))
                        .collect::<Vec<_>>()
                        .join("\n");
                    return Err(Error::InvalidArgument {
                        argument: arg.stripped.clone(),
                        argument_span: op.arg_spans[i],
                        line_number: op.lineno,
                        line: op.line.clone(),
                        why,
                    });
                }
            }
        };
        out.push(parsed);
    }

    for (i, (parsed, mask)) in out.iter().zip(kinds).enumerate() {
        if !parsed.matches(*mask) {
            return Err(Error::InvalidArgumentKind {
                argument: parsed.stripped.clone(),
                argument_span: op.arg_spans[i],
                instruction: op.opcode.clone(),
                line_number: op.lineno,
                line: op.line.clone(),
            });
        }
    }

    Ok(out)
}

/// Whether every argument in `args` is fully resolved (no pending label).
pub fn all_args_parsed(args: &[Arg]) -> bool {
    args.iter().all(|a| a.is_resolved())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::context::Context;
    use crate::assembler::registry;

    fn ctx() -> Context {
        Context::new(registry::lookup("ibm5100").unwrap())
    }

    #[test]
    fn parses_dollar_hex() {
        assert_eq!(parse_integer(&ctx(), "$2A").unwrap(), 0x2A);
    }

    #[test]
    fn parses_postfix_hex() {
        assert_eq!(parse_integer(&ctx(), "2Ah").unwrap(), 0x2A);
    }

    #[test]
    fn parses_negative_decimal() {
        assert_eq!(parse_integer(&ctx(), "-5d").unwrap(), -5);
    }

    #[test]
    fn parses_0x_prefix() {
        assert_eq!(parse_integer(&ctx(), "0x2a").unwrap(), 0x2A);
    }

    #[test]
    fn parses_binary() {
        assert_eq!(parse_integer(&ctx(), "1010b").unwrap(), 0b1010);
    }

    #[test]
    fn parses_single_char_string() {
        assert_eq!(parse_integer(&ctx(), "'A'").unwrap(), 'A' as i64);
    }

    #[test]
    fn rejects_multichar_string() {
        assert!(parse_integer(&ctx(), "'AB'").is_err());
    }

    #[test]
    fn rejects_empty_literal() {
        assert!(parse_integer(&ctx(), "").is_err());
    }

    #[test]
    fn register_prefix_with_no_number_is_minus_one() {
        let context = ctx();
        let options = ParseOptions::new(&["r", "sp"]);
        let arg = parse_register(&options, &context, "sp").unwrap();
        assert_eq!(arg.integer, -1);
        assert_eq!(arg.register_prefix, "sp");
    }

    #[test]
    fn register_longest_prefix_wins() {
        let context = ctx();
        let options = ParseOptions::new(&["r", "sp"]);
        let arg = parse_register(&options, &context, "sp5").unwrap();
        assert_eq!(arg.register_prefix, "sp");
        assert_eq!(arg.integer, 5);
    }

    #[test]
    fn deref_with_postcrement() {
        let context = ctx();
        let options = ParseOptions::new(&["r"]);
        let arg = parse_deref(&options, &context, "(r3)+").unwrap();
        assert_eq!(arg.kind, Some(ArgKind::DerefRegister));
        assert_eq!(arg.integer, 3);
        assert_eq!(arg.postcrement, 1.0);
    }

    #[test]
    fn deref_precrement_rejects_without_fractional_option() {
        let context = ctx();
        let options = ParseOptions::new(&["r"]);
        assert!(parse_deref(&options, &context, "~(r3)").is_err());
    }

    #[test]
    fn unbound_label_is_unresolved_not_an_error() {
        let context = ctx();
        let arg = parse_address(&context, "not_yet_bound").unwrap();
        assert!(!arg.is_resolved());
        assert_eq!(arg.kind, Some(ArgKind::Address));
    }
}
