//! Math normalization: rewrite pandoc's math spans into static markup.
//!
//! ## Why is this stage necessary?
//!
//! Pandoc marks mathematics it finds as `<span class="math inline">` /
//! `<span class="math display">` elements, but the *content* of those spans
//! is not uniform. When the reader parsed a math environment natively the
//! span holds clean LaTeX; when it could not (common with raw-LaTeX
//! passthrough), the span still carries the raw-fallback delimiters —
//! literal `$…$`, `$$…$$`, `\(…\)`, `\[…\]`, or a whole
//! `\begin{equation}…\end{equation}` wrapper. This module strips exactly
//! one layer of such wrapping, renders the source to MathML, and replaces
//! each span in place.
//!
//! ## Failure policy
//!
//! [`pre_render_math`] never fails. A malformed expression is replaced with
//! a visible, machine-inspectable marker (the original source preserved in
//! a `data-math-source` attribute, literal `[MATH ERROR]` text) and the
//! failure is collected in the returned outcome. A manuscript with a
//! handful of bad equations therefore stays reviewable in place; the health
//! evaluator decides afterwards whether the run may proceed.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{MathError, MathMode};
use crate::pipeline::mathml;

/// Result of normalizing all math spans in one HTML fragment.
///
/// Returned by value — errors are not accumulated through a caller-owned
/// buffer, which keeps the function pure and directly testable.
#[derive(Debug, Clone)]
pub struct MathRenderOutcome {
    /// The fully rewritten HTML. Every math span has been replaced, either
    /// with rendered markup or with an error marker.
    pub html: String,
    /// One entry per failed expression, in document order.
    pub errors: Vec<MathError>,
}

static RE_MATH_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span class="math (inline|display)">(.*?)</span>"#).unwrap()
});

/// Replace every math span in `html` with statically rendered MathML.
///
/// Total over all inputs: per-expression render failures become inline
/// error markers plus collected [`MathError`] entries; the document always
/// completes.
pub fn pre_render_math(html: &str) -> MathRenderOutcome {
    let mut errors: Vec<MathError> = Vec::new();

    let rewritten = RE_MATH_SPAN.replace_all(html, |caps: &Captures<'_>| {
        let mode = if &caps[1] == "display" {
            MathMode::Display
        } else {
            MathMode::Inline
        };
        let raw = decode_entities(&caps[2]);
        let source = strip_raw_delimiters(&raw, mode);

        match mathml::render_math(&source, mode) {
            Ok(rendered) => rendered,
            Err(message) => {
                // The marker keeps the span's text as written, delimiters
                // and all, so the defect can be found in the source.
                errors.push(MathError {
                    mode,
                    message,
                    source_tex: raw.clone(),
                });
                error_marker(&raw)
            }
        }
    });

    MathRenderOutcome {
        html: rewritten.into_owned(),
        errors,
    }
}

/// Strip exactly one layer of raw-fallback delimiters.
///
/// Display markers are checked first regardless of the span's mode, so an
/// inline `$` inside a `$$ … $$` pair never mis-fires; the single-dollar
/// strip additionally requires the stripped form to not itself start with
/// a second `$`.
fn strip_raw_delimiters(raw: &str, mode: MathMode) -> String {
    let s = raw.trim();

    if let Some(inner) = s.strip_prefix("$$").and_then(|r| r.strip_suffix("$$")) {
        if !inner.is_empty() {
            return strip_equation_env(inner.trim()).to_string();
        }
    }
    if let Some(inner) = s.strip_prefix(r"\[").and_then(|r| r.strip_suffix(r"\]")) {
        return strip_equation_env(inner.trim()).to_string();
    }
    let unwrapped = strip_equation_env(s);
    if unwrapped != s {
        return unwrapped.to_string();
    }

    if mode == MathMode::Inline {
        if let Some(inner) = s.strip_prefix(r"\(").and_then(|r| r.strip_suffix(r"\)")) {
            return inner.trim().to_string();
        }
        if s.len() >= 2 && s.starts_with('$') && s.ends_with('$') {
            let inner = &s[1..s.len() - 1];
            if !inner.starts_with('$') {
                return inner.trim().to_string();
            }
        }
    }

    s.to_string()
}

fn strip_equation_env(s: &str) -> &str {
    for env in ["equation*", "equation"] {
        let begin = format!("\\begin{{{env}}}");
        let end = format!("\\end{{{env}}}");
        if let Some(inner) = s.strip_prefix(begin.as_str()) {
            if let Some(inner) = inner.strip_suffix(end.as_str()) {
                return inner.trim();
            }
        }
    }
    s
}

/// The in-place marker for an expression that failed to render.
///
/// Carries the span's original raw text (before delimiter stripping) as
/// data so a reviewer (or a follow-up tool) can locate and fix the defect
/// without re-running the pipeline.
fn error_marker(source: &str) -> String {
    format!(
        r#"<span class="math-error" data-math-source="{}">[MATH ERROR]</span>"#,
        escape_attr(source)
    )
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_clean_inline_span() {
        let html = r#"<p>Let <span class="math inline">x^2</span> grow.</p>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty());
        assert!(out.html.contains("<math"), "got: {}", out.html);
        assert!(!out.html.contains(r#"class="math inline""#));
    }

    #[test]
    fn strips_inline_dollar_fallback() {
        let html = r#"<span class="math inline">$a+b$</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty());
        assert!(out.html.contains("<mi>a</mi><mo>+</mo><mi>b</mi>"), "got: {}", out.html);
    }

    #[test]
    fn strips_inline_paren_fallback() {
        let html = r#"<span class="math inline">\(E = mc^2\)</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty());
        assert!(out.html.contains("<msup>"), "got: {}", out.html);
    }

    #[test]
    fn display_double_dollar_takes_precedence_over_inline_dollar() {
        // The spec's delimiter-precedence property: "$$x^2$$" must strip to
        // "x^2", never to "$x^2$" with leftover dollars.
        let html = r#"<span class="math display">$$x^2$$</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert!(
            out.html.contains("<msup><mi>x</mi><mn>2</mn></msup>"),
            "got: {}",
            out.html
        );
        assert!(!out.html.contains('$'), "got: {}", out.html);
    }

    #[test]
    fn strips_display_bracket_fallback() {
        let html = r#"<span class="math display">\[\frac{1}{2}\]</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty());
        assert!(out.html.contains("<mfrac>"), "got: {}", out.html);
    }

    #[test]
    fn strips_equation_environment_wrapper() {
        let html =
            r#"<span class="math display">\begin{equation}a = b\end{equation}</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert!(out.html.contains("<mo>=</mo>"), "got: {}", out.html);
    }

    #[test]
    fn strips_starred_equation_inside_dollars() {
        let html = r#"<span class="math display">$$\begin{equation*}y\end{equation*}$$</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert!(out.html.contains("<mi>y</mi>"), "got: {}", out.html);
    }

    #[test]
    fn malformed_expression_yields_marker_and_error() {
        let html = r#"<p><span class="math inline">\frac{1}{</span></p>"#;
        let out = pre_render_math(html);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].mode, MathMode::Inline);
        assert!(out.html.contains("[MATH ERROR]"), "got: {}", out.html);
        assert!(
            out.html.contains(r#"data-math-source="\frac{1}{""#),
            "marker must carry the raw source, got: {}",
            out.html
        );
        // Surrounding document is untouched.
        assert!(out.html.starts_with("<p>"));
        assert!(out.html.ends_with("</p>"));
    }

    #[test]
    fn marker_keeps_the_span_text_before_delimiter_stripping() {
        // The delimiters the author wrote must survive into the marker,
        // even though rendering sees the stripped form.
        let html = r#"<span class="math display">$$\frac{1}{$$</span>"#;
        let out = pre_render_math(html);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].source_tex, r"$$\frac{1}{$$");
        assert!(
            out.html.contains(r#"data-math-source="$$\frac{1}{$$""#),
            "got: {}",
            out.html
        );
    }

    #[test]
    fn never_throws_and_always_completes() {
        let html = concat!(
            r#"<span class="math inline">\frac{1}{</span>"#,
            r#"<span class="math display">$$\unknowncmd$$</span>"#,
            r#"<span class="math inline">a+b</span>"#,
        );
        let out = pre_render_math(html);
        assert_eq!(out.errors.len(), 2, "errors: {:?}", out.errors);
        // The good expression after the bad ones still rendered.
        assert!(out.html.contains("<mo>+</mo>"), "got: {}", out.html);
        assert_eq!(out.html.matches("[MATH ERROR]").count(), 2);
    }

    #[test]
    fn errors_are_in_document_order() {
        let html = concat!(
            r#"<span class="math inline">\first</span>"#,
            r#"<span class="math display">\second</span>"#,
        );
        let out = pre_render_math(html);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors[0].message.contains("first"));
        assert!(out.errors[1].message.contains("second"));
        assert_eq!(out.errors[1].mode, MathMode::Display);
    }

    #[test]
    fn html_without_math_passes_through_unchanged() {
        let html = "<h1>Title</h1><p>No math here, not even a $ sign issue.</p>";
        let out = pre_render_math(html);
        assert!(out.errors.is_empty());
        assert_eq!(out.html, html);
    }

    #[test]
    fn decodes_entities_before_rendering() {
        // Pandoc escapes the span's text content.
        let html = r#"<span class="math inline">a &lt; b</span>"#;
        let out = pre_render_math(html);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        assert!(out.html.contains("<mo>&lt;</mo>"), "got: {}", out.html);
    }
}
