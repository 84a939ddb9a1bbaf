//! Static math rendering: LaTeX source to MathML.
//!
//! This is the renderer behind the math normalizer. It tokenizes a LaTeX
//! math expression and builds Presentation MathML via recursive descent —
//! groups, sub/superscripts, fractions, radicals, accents, alphabet
//! variants and a symbol table covering the constructs STEM manuscripts
//! actually use.
//!
//! The renderer is deliberately strict about malformed input: unbalanced
//! braces, unknown commands, missing arguments and dangling scripts are all
//! recoverable `Err(String)` values naming the defect. The caller
//! ([`crate::pipeline::math`]) turns each failure into an in-place error
//! marker plus a collected [`crate::error::MathError`]; nothing here panics
//! on any input.

use crate::error::MathMode;

/// Render a LaTeX math expression to a MathML element.
///
/// `mode` controls the `display` attribute (`inline` vs `block`) only;
/// parsing is identical for both.
pub fn render_math(src: &str, mode: MathMode) -> Result<String, String> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Err("empty math expression".to_string());
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser { tokens, pos: 0 };
    let body = parser.parse_sequence(false)?;
    if parser.pos < parser.tokens.len() {
        // parse_sequence only stops early on an unmatched close brace
        return Err("unbalanced braces: unexpected '}'".to_string());
    }

    let display = match mode {
        MathMode::Inline => "inline",
        MathMode::Display => "block",
    };
    Ok(format!(
        r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="{display}"><mrow>{body}</mrow></math>"#
    ))
}

// ── Tokenizer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// `\name` or a single-character control sequence like `\{`.
    Command(String),
    Open,
    Close,
    Sup,
    Sub,
    Char(char),
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let mut name = String::new();
                match chars.peek() {
                    Some(&n) if n.is_ascii_alphabetic() => {
                        while let Some(&n) = chars.peek() {
                            if n.is_ascii_alphabetic() {
                                name.push(n);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        // Starred forms (\operatorname* etc.) fold to the base name.
                        if chars.peek() == Some(&'*') {
                            chars.next();
                        }
                    }
                    Some(&n) => {
                        name.push(n);
                        chars.next();
                    }
                    None => return Err("trailing backslash".to_string()),
                }
                tokens.push(Token::Command(name));
            }
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '^' => tokens.push(Token::Sup),
            '_' => tokens.push(Token::Sub),
            c if c.is_whitespace() => {}
            '&' => {
                return Err("alignment character '&' is not supported outside an alignment environment".to_string());
            }
            c => tokens.push(Token::Char(c)),
        }
    }

    Ok(tokens)
}

// ── Parser ───────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Parse atoms until end of input or, when `in_group`, the matching `}`.
    fn parse_sequence(&mut self, in_group: bool) -> Result<String, String> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    if in_group {
                        return Err("unbalanced braces: missing '}'".to_string());
                    }
                    return Ok(out);
                }
                Some(Token::Close) => {
                    if in_group {
                        self.pos += 1;
                        return Ok(out);
                    }
                    return Ok(out); // caller reports the stray '}'
                }
                _ => out.push_str(&self.parse_scripted_atom()?),
            }
        }
    }

    /// One atom plus any `^`/`_` scripts attached to it.
    fn parse_scripted_atom(&mut self) -> Result<String, String> {
        match self.peek() {
            Some(Token::Sup) | Some(Token::Sub) => {
                return Err("script with no base".to_string());
            }
            _ => {}
        }

        let base = self.parse_atom()?;
        let mut sub: Option<String> = None;
        let mut sup: Option<String> = None;

        loop {
            match self.peek() {
                Some(Token::Sup) => {
                    if sup.is_some() {
                        return Err("double superscript".to_string());
                    }
                    self.pos += 1;
                    sup = Some(self.parse_argument("superscript")?);
                }
                Some(Token::Sub) => {
                    if sub.is_some() {
                        return Err("double subscript".to_string());
                    }
                    self.pos += 1;
                    sub = Some(self.parse_argument("subscript")?);
                }
                _ => break,
            }
        }

        Ok(match (sub, sup) {
            (None, None) => base,
            (Some(b), None) => format!("<msub>{}{}</msub>", row(&base), row(&b)),
            (None, Some(p)) => format!("<msup>{}{}</msup>", row(&base), row(&p)),
            (Some(b), Some(p)) => {
                format!("<msubsup>{}{}{}</msubsup>", row(&base), row(&b), row(&p))
            }
        })
    }

    /// A single atom: group, command, or character.
    fn parse_atom(&mut self) -> Result<String, String> {
        match self.next() {
            None => Err("unexpected end of expression".to_string()),
            Some(Token::Open) => {
                let inner = self.parse_sequence(true)?;
                Ok(format!("<mrow>{inner}</mrow>"))
            }
            Some(Token::Close) => Err("unbalanced braces: unexpected '}'".to_string()),
            Some(Token::Sup) | Some(Token::Sub) => Err("script with no base".to_string()),
            Some(Token::Char(c)) => Ok(render_char(c)),
            Some(Token::Command(name)) => self.parse_command(&name),
        }
    }

    /// An argument to a command or script: a group, or a single token.
    fn parse_argument(&mut self, what: &str) -> Result<String, String> {
        match self.peek() {
            None => Err(format!("{what} is missing its argument")),
            Some(Token::Close) => Err(format!("{what} is missing its argument")),
            _ => self.parse_atom(),
        }
    }

    fn parse_command(&mut self, name: &str) -> Result<String, String> {
        // Fixed symbols first — the common case.
        if let Some(mathml) = symbol(name) {
            return Ok(mathml.to_string());
        }

        match name {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.parse_argument("\\frac numerator")?;
                let den = self.parse_argument("\\frac denominator")?;
                Ok(format!("<mfrac>{}{}</mfrac>", row(&num), row(&den)))
            }
            "binom" => {
                let top = self.parse_argument("\\binom upper")?;
                let bot = self.parse_argument("\\binom lower")?;
                Ok(format!(
                    "<mrow><mo>(</mo><mfrac linethickness=\"0\">{}{}</mfrac><mo>)</mo></mrow>",
                    row(&top),
                    row(&bot)
                ))
            }
            "sqrt" => {
                // Optional index: \sqrt[3]{x}
                if self.peek() == Some(&Token::Char('[')) {
                    self.pos += 1;
                    let mut index = String::new();
                    loop {
                        match self.peek() {
                            None => return Err("\\sqrt index is missing ']'".to_string()),
                            Some(Token::Char(']')) => {
                                self.pos += 1;
                                break;
                            }
                            _ => index.push_str(&self.parse_scripted_atom()?),
                        }
                    }
                    let radicand = self.parse_argument("\\sqrt")?;
                    Ok(format!("<mroot>{}{}</mroot>", row(&radicand), row(&index)))
                } else {
                    let radicand = self.parse_argument("\\sqrt")?;
                    Ok(format!("<msqrt>{radicand}</msqrt>"))
                }
            }
            "text" | "textrm" | "mbox" => {
                let content = self.parse_text_group(name)?;
                Ok(format!("<mtext>{}</mtext>", escape(&content)))
            }
            "operatorname" => {
                let content = self.parse_text_group(name)?;
                Ok(format!("<mi>{}</mi>", escape(&content)))
            }
            "mathrm" => self.variant_group("normal"),
            "mathbf" => self.variant_group("bold"),
            "mathit" => self.variant_group("italic"),
            "mathbb" => self.variant_group("double-struck"),
            "mathcal" => self.variant_group("script"),
            "mathfrak" => self.variant_group("fraktur"),
            "mathsf" => self.variant_group("sans-serif"),
            "mathtt" => self.variant_group("monospace"),
            "hat" => self.accent("^"),
            "bar" | "overline" => self.accent("&#x00AF;"),
            "vec" => self.accent("&#x2192;"),
            "tilde" => self.accent("~"),
            "dot" => self.accent("&#x02D9;"),
            "ddot" => self.accent("&#x00A8;"),
            "left" => {
                let delim = self.parse_delimiter("\\left")?;
                Ok(format!("<mo stretchy=\"true\">{delim}</mo>"))
            }
            "right" => {
                let delim = self.parse_delimiter("\\right")?;
                Ok(format!("<mo stretchy=\"true\">{delim}</mo>"))
            }
            _ => Err(format!("unknown command \\{name}")),
        }
    }

    /// `\mathXX{…}` — wrap identifier content in a mathvariant.
    fn variant_group(&mut self, variant: &str) -> Result<String, String> {
        let content = self.parse_text_group("font command")?;
        Ok(format!(
            "<mi mathvariant=\"{variant}\">{}</mi>",
            escape(&content)
        ))
    }

    /// `\hat{x}` and friends — base with an over-accent.
    fn accent(&mut self, mark: &str) -> Result<String, String> {
        let base = self.parse_argument("accent")?;
        Ok(format!(
            "<mover accent=\"true\">{}<mo>{mark}</mo></mover>",
            row(&base)
        ))
    }

    /// Raw text content of a braced group (for \text, \mathrm, …).
    ///
    /// Consumes literal characters without math interpretation; nested
    /// commands inside a text group are not supported and surface as errors.
    fn parse_text_group(&mut self, what: &str) -> Result<String, String> {
        match self.next() {
            Some(Token::Open) => {}
            Some(Token::Char(c)) => return Ok(c.to_string()),
            _ => return Err(format!("\\{what} is missing its argument")),
        }
        let mut content = String::new();
        loop {
            match self.next() {
                None => return Err("unbalanced braces: missing '}'".to_string()),
                Some(Token::Close) => return Ok(content),
                Some(Token::Char(c)) => content.push(c),
                Some(Token::Sup) => content.push('^'),
                Some(Token::Sub) => content.push('_'),
                Some(Token::Open) => {
                    return Err(format!("nested group inside \\{what} is not supported"))
                }
                Some(Token::Command(name)) => {
                    return Err(format!("command \\{name} inside \\{what} is not supported"))
                }
            }
        }
    }

    /// Delimiter after `\left` / `\right`.
    fn parse_delimiter(&mut self, what: &str) -> Result<String, String> {
        match self.next() {
            Some(Token::Char('.')) => Ok(String::new()), // invisible delimiter
            Some(Token::Char(c)) if "()[]|/<>".contains(c) => Ok(escape(&c.to_string())),
            Some(Token::Command(name)) => match name.as_str() {
                "{" => Ok("{".to_string()),
                "}" => Ok("}".to_string()),
                "langle" => Ok("&#x27E8;".to_string()),
                "rangle" => Ok("&#x27E9;".to_string()),
                "|" | "Vert" => Ok("&#x2016;".to_string()),
                "lvert" | "rvert" | "vert" => Ok("|".to_string()),
                _ => Err(format!("{what}: '\\{name}' is not a delimiter")),
            },
            other => Err(format!("{what} is missing its delimiter (got {other:?})")),
        }
    }
}

// ── Leaf rendering ───────────────────────────────────────────────────────

fn render_char(c: char) -> String {
    if c.is_ascii_digit() {
        format!("<mn>{c}</mn>")
    } else if c.is_alphabetic() {
        format!("<mi>{c}</mi>")
    } else {
        format!("<mo>{}</mo>", escape(&c.to_string()))
    }
}

/// Wrap multi-node content in an `<mrow>`; a single element passes through.
///
/// `msub`/`mfrac`/… require exactly one child per slot, so anything that is
/// a sequence gets a row wrapper.
fn row(content: &str) -> String {
    if is_single_element(content) {
        content.to_string()
    } else {
        format!("<mrow>{content}</mrow>")
    }
}

/// True when `s` is exactly one MathML element (its first tag's close is the
/// end of the string). Tag depth tracking only — the renderer emits no `<`
/// or `>` outside tags, entities cover the rest.
fn is_single_element(s: &str) -> bool {
    if !s.starts_with('<') {
        return false;
    }
    let mut depth: i32 = 0;
    let mut rest = s;
    let mut consumed = 0usize;
    while let Some(start) = rest.find('<') {
        let Some(end_rel) = rest[start..].find('>') else {
            return false;
        };
        let end = start + end_rel;
        let tag = &rest[start..=end];
        if tag.starts_with("</") {
            depth -= 1;
        } else if !tag.ends_with("/>") {
            depth += 1;
        }
        consumed += end + 1;
        rest = &rest[end + 1..];
        if depth == 0 {
            return consumed == s.len();
        }
    }
    false
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Fixed symbol table: argument-less commands.
fn symbol(name: &str) -> Option<&'static str> {
    Some(match name {
        // Lowercase greek
        "alpha" => "<mi>&#x3B1;</mi>",
        "beta" => "<mi>&#x3B2;</mi>",
        "gamma" => "<mi>&#x3B3;</mi>",
        "delta" => "<mi>&#x3B4;</mi>",
        "epsilon" | "varepsilon" => "<mi>&#x3B5;</mi>",
        "zeta" => "<mi>&#x3B6;</mi>",
        "eta" => "<mi>&#x3B7;</mi>",
        "theta" => "<mi>&#x3B8;</mi>",
        "iota" => "<mi>&#x3B9;</mi>",
        "kappa" => "<mi>&#x3BA;</mi>",
        "lambda" => "<mi>&#x3BB;</mi>",
        "mu" => "<mi>&#x3BC;</mi>",
        "nu" => "<mi>&#x3BD;</mi>",
        "xi" => "<mi>&#x3BE;</mi>",
        "pi" => "<mi>&#x3C0;</mi>",
        "rho" => "<mi>&#x3C1;</mi>",
        "sigma" => "<mi>&#x3C3;</mi>",
        "tau" => "<mi>&#x3C4;</mi>",
        "upsilon" => "<mi>&#x3C5;</mi>",
        "phi" | "varphi" => "<mi>&#x3C6;</mi>",
        "chi" => "<mi>&#x3C7;</mi>",
        "psi" => "<mi>&#x3C8;</mi>",
        "omega" => "<mi>&#x3C9;</mi>",
        // Uppercase greek
        "Gamma" => "<mi mathvariant=\"normal\">&#x393;</mi>",
        "Delta" => "<mi mathvariant=\"normal\">&#x394;</mi>",
        "Theta" => "<mi mathvariant=\"normal\">&#x398;</mi>",
        "Lambda" => "<mi mathvariant=\"normal\">&#x39B;</mi>",
        "Xi" => "<mi mathvariant=\"normal\">&#x39E;</mi>",
        "Pi" => "<mi mathvariant=\"normal\">&#x3A0;</mi>",
        "Sigma" => "<mi mathvariant=\"normal\">&#x3A3;</mi>",
        "Phi" => "<mi mathvariant=\"normal\">&#x3A6;</mi>",
        "Psi" => "<mi mathvariant=\"normal\">&#x3A8;</mi>",
        "Omega" => "<mi mathvariant=\"normal\">&#x3A9;</mi>",
        // Big operators
        "sum" => "<mo>&#x2211;</mo>",
        "prod" => "<mo>&#x220F;</mo>",
        "int" => "<mo>&#x222B;</mo>",
        "iint" => "<mo>&#x222C;</mo>",
        "oint" => "<mo>&#x222E;</mo>",
        "bigcup" => "<mo>&#x22C3;</mo>",
        "bigcap" => "<mo>&#x22C2;</mo>",
        // Relations
        "le" | "leq" => "<mo>&#x2264;</mo>",
        "ge" | "geq" => "<mo>&#x2265;</mo>",
        "ne" | "neq" => "<mo>&#x2260;</mo>",
        "approx" => "<mo>&#x2248;</mo>",
        "equiv" => "<mo>&#x2261;</mo>",
        "sim" => "<mo>&#x223C;</mo>",
        "simeq" => "<mo>&#x2243;</mo>",
        "propto" => "<mo>&#x221D;</mo>",
        "ll" => "<mo>&#x226A;</mo>",
        "gg" => "<mo>&#x226B;</mo>",
        "in" => "<mo>&#x2208;</mo>",
        "notin" => "<mo>&#x2209;</mo>",
        "subset" => "<mo>&#x2282;</mo>",
        "subseteq" => "<mo>&#x2286;</mo>",
        "supset" => "<mo>&#x2283;</mo>",
        "supseteq" => "<mo>&#x2287;</mo>",
        // Binary operators
        "pm" => "<mo>&#x00B1;</mo>",
        "mp" => "<mo>&#x2213;</mo>",
        "cdot" => "<mo>&#x22C5;</mo>",
        "times" => "<mo>&#x00D7;</mo>",
        "div" => "<mo>&#x00F7;</mo>",
        "ast" => "<mo>&#x2217;</mo>",
        "star" => "<mo>&#x22C6;</mo>",
        "circ" => "<mo>&#x2218;</mo>",
        "oplus" => "<mo>&#x2295;</mo>",
        "otimes" => "<mo>&#x2297;</mo>",
        "cup" => "<mo>&#x222A;</mo>",
        "cap" => "<mo>&#x2229;</mo>",
        "setminus" => "<mo>&#x2216;</mo>",
        "wedge" | "land" => "<mo>&#x2227;</mo>",
        "vee" | "lor" => "<mo>&#x2228;</mo>",
        // Arrows
        "to" | "rightarrow" => "<mo>&#x2192;</mo>",
        "leftarrow" | "gets" => "<mo>&#x2190;</mo>",
        "leftrightarrow" => "<mo>&#x2194;</mo>",
        "Rightarrow" | "implies" => "<mo>&#x21D2;</mo>",
        "Leftarrow" => "<mo>&#x21D0;</mo>",
        "Leftrightarrow" | "iff" => "<mo>&#x21D4;</mo>",
        "mapsto" => "<mo>&#x21A6;</mo>",
        // Misc symbols
        "infty" => "<mi>&#x221E;</mi>",
        "partial" => "<mi>&#x2202;</mi>",
        "nabla" => "<mi>&#x2207;</mi>",
        "forall" => "<mo>&#x2200;</mo>",
        "exists" => "<mo>&#x2203;</mo>",
        "emptyset" | "varnothing" => "<mi>&#x2205;</mi>",
        "hbar" => "<mi>&#x210F;</mi>",
        "ell" => "<mi>&#x2113;</mi>",
        "Re" => "<mi>&#x211C;</mi>",
        "Im" => "<mi>&#x2111;</mi>",
        "aleph" => "<mi>&#x2135;</mi>",
        "angle" => "<mi>&#x2220;</mi>",
        "prime" => "<mo>&#x2032;</mo>",
        "ldots" | "dots" | "dotsc" => "<mo>&#x2026;</mo>",
        "cdots" | "dotsb" => "<mo>&#x22EF;</mo>",
        "vdots" => "<mo>&#x22EE;</mo>",
        "ddots" => "<mo>&#x22F1;</mo>",
        // Named functions (upright identifiers)
        "sin" => "<mi>sin</mi>",
        "cos" => "<mi>cos</mi>",
        "tan" => "<mi>tan</mi>",
        "cot" => "<mi>cot</mi>",
        "sec" => "<mi>sec</mi>",
        "csc" => "<mi>csc</mi>",
        "arcsin" => "<mi>arcsin</mi>",
        "arccos" => "<mi>arccos</mi>",
        "arctan" => "<mi>arctan</mi>",
        "sinh" => "<mi>sinh</mi>",
        "cosh" => "<mi>cosh</mi>",
        "tanh" => "<mi>tanh</mi>",
        "log" => "<mi>log</mi>",
        "ln" => "<mi>ln</mi>",
        "lg" => "<mi>lg</mi>",
        "exp" => "<mi>exp</mi>",
        "det" => "<mi>det</mi>",
        "dim" => "<mi>dim</mi>",
        "ker" => "<mi>ker</mi>",
        "deg" => "<mi>deg</mi>",
        "gcd" => "<mi>gcd</mi>",
        "min" => "<mi>min</mi>",
        "max" => "<mi>max</mi>",
        "inf" => "<mi>inf</mi>",
        "sup" => "<mi>sup</mi>",
        "lim" => "<mo>lim</mo>",
        "limsup" => "<mo>lim&#xA0;sup</mo>",
        "liminf" => "<mo>lim&#xA0;inf</mo>",
        "mod" | "bmod" => "<mo>mod</mo>",
        // Spacing
        "," | ":" | ";" => "<mspace width=\"0.2em\"/>",
        "!" => "",
        "quad" => "<mspace width=\"1em\"/>",
        "qquad" => "<mspace width=\"2em\"/>",
        " " => "<mspace width=\"0.3em\"/>",
        "\\" => "<mspace linebreak=\"newline\"/>",
        // Escaped literals
        "{" => "<mo>{</mo>",
        "}" => "<mo>}</mo>",
        "%" => "<mo>%</mo>",
        "$" => "<mo>$</mo>",
        "#" => "<mo>#</mo>",
        "_" => "<mo>_</mo>",
        "&" => "<mo>&amp;</mo>",
        "|" => "<mo>&#x2016;</mo>",
        "langle" => "<mo>&#x27E8;</mo>",
        "rangle" => "<mo>&#x27E9;</mo>",
        "lfloor" => "<mo>&#x230A;</mo>",
        "rfloor" => "<mo>&#x230B;</mo>",
        "lceil" => "<mo>&#x2308;</mo>",
        "rceil" => "<mo>&#x2309;</mo>",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(src: &str) -> Result<String, String> {
        render_math(src, MathMode::Inline)
    }

    #[test]
    fn renders_simple_identifier_power() {
        let out = inline("x^2").unwrap();
        assert!(out.contains("<msup><mi>x</mi><mn>2</mn></msup>"), "got: {out}");
        assert!(out.contains(r#"display="inline""#));
    }

    #[test]
    fn display_mode_sets_block() {
        let out = render_math("x", MathMode::Display).unwrap();
        assert!(out.contains(r#"display="block""#));
    }

    #[test]
    fn renders_fraction() {
        let out = inline(r"\frac{a+b}{2}").unwrap();
        assert!(out.contains("<mfrac>"), "got: {out}");
        assert!(out.contains("<mi>a</mi><mo>+</mo><mi>b</mi>"), "got: {out}");
    }

    #[test]
    fn renders_subsup_combined() {
        let out = inline(r"\sum_{i=1}^{n} i").unwrap();
        assert!(out.contains("<msubsup>"), "got: {out}");
        assert!(out.contains("&#x2211;"), "got: {out}");
    }

    #[test]
    fn sub_then_sup_order_does_not_matter() {
        let a = inline("x_1^2").unwrap();
        let b = inline("x^2_1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn renders_sqrt_and_root() {
        assert!(inline(r"\sqrt{2}").unwrap().contains("<msqrt>"));
        let root = inline(r"\sqrt[3]{x}").unwrap();
        assert!(root.contains("<mroot>"), "got: {root}");
    }

    #[test]
    fn renders_greek_and_relations() {
        let out = inline(r"\alpha \le \beta").unwrap();
        assert!(out.contains("&#x3B1;"));
        assert!(out.contains("&#x2264;"));
    }

    #[test]
    fn renders_mathbb() {
        let out = inline(r"\mathbb{R}").unwrap();
        assert!(out.contains(r#"mathvariant="double-struck""#), "got: {out}");
    }

    #[test]
    fn renders_text_content_escaped() {
        let out = inline(r"\text{a<b}").unwrap();
        assert!(out.contains("<mtext>a&lt;b</mtext>"), "got: {out}");
    }

    #[test]
    fn unbalanced_open_brace_is_an_error() {
        let err = inline(r"\frac{1}{").unwrap_err();
        assert!(err.contains("missing"), "got: {err}");
    }

    #[test]
    fn stray_close_brace_is_an_error() {
        let err = inline("x}").unwrap_err();
        assert!(err.contains("unexpected '}'"), "got: {err}");
    }

    #[test]
    fn unknown_command_is_an_error_naming_it() {
        let err = inline(r"\notacommand x").unwrap_err();
        assert!(err.contains("\\notacommand"), "got: {err}");
    }

    #[test]
    fn dangling_script_is_an_error() {
        assert!(inline("x^").is_err());
        assert!(inline("_2").is_err());
        assert!(inline("x^2^3").unwrap_err().contains("double superscript"));
    }

    #[test]
    fn missing_frac_argument_is_an_error() {
        let err = inline(r"\frac{1}").unwrap_err();
        assert!(err.contains("denominator"), "got: {err}");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(inline("   ").is_err());
    }

    #[test]
    fn trailing_backslash_is_an_error() {
        assert!(inline("x +\\").is_err());
    }

    #[test]
    fn never_panics_on_garbage() {
        // A grab-bag of malformed inputs; each must return Ok or Err, not panic.
        for src in [
            "{{{", "}}}", "^^^", r"\", r"\frac", r"\sqrt[", "a&b", r"\left",
            r"\right)", "x_", r"\text{", r"\mathbb", "\u{0}\u{1}",
        ] {
            let _ = inline(src);
        }
    }

    #[test]
    fn left_right_delimiters() {
        let out = inline(r"\left( \frac{x}{y} \right)").unwrap();
        assert!(out.contains(r#"<mo stretchy="true">(</mo>"#), "got: {out}");
    }

    #[test]
    fn accents_render_as_mover() {
        let out = inline(r"\hat{x}").unwrap();
        assert!(out.contains("<mover accent=\"true\">"), "got: {out}");
    }
}
