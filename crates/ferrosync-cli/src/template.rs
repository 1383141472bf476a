//! Viewer/editor command templating.
//!
//! Commands are plain strings with `%{key}` placeholders drawn from a
//! fixed key set; rendering is a pure function over the bindings, never
//! in-place mutation. `%%` escapes a literal percent; an unrecognized
//! key is left verbatim so a typo stays visible in the launched command.

/// The keys a command template may reference.
pub const KEYS: &[&str] = &[
    "output", "input", "line", "line+1", "column", "column+1", "page", "page+1", "x", "y", "h",
    "v", "width", "height", "before", "offset", "middle", "after", "context",
];

/// Substitutes `%{key}` placeholders from `bindings`.
pub fn render(template: &str, bindings: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        if let Some(stripped) = tail.strip_prefix('%') {
            out.push('%');
            rest = stripped;
        } else if let Some(end) = tail.strip_prefix('{').and_then(|t| t.find('}')) {
            let key = &tail[1..1 + end];
            match bindings.iter().find(|(name, _)| *name == key) {
                Some((_, value)) => out.push_str(value),
                None => {
                    out.push_str("%{");
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &tail[end + 2..];
        } else {
            out.push('%');
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Vec<(&'static str, String)> {
        vec![
            ("input", "./main.tex".to_string()),
            ("line", "41".to_string()),
            ("line+1", "42".to_string()),
        ]
    }

    #[test]
    fn substitutes_known_keys() {
        assert_eq!(
            render("edit +%{line+1} %{input}", &bindings()),
            "edit +42 ./main.tex"
        );
    }

    #[test]
    fn unknown_keys_stay_verbatim() {
        assert_eq!(render("go %{nope}", &bindings()), "go %{nope}");
    }

    #[test]
    fn double_percent_escapes() {
        assert_eq!(render("100%% of %{line}", &bindings()), "100% of 41");
    }

    #[test]
    fn stray_percent_is_literal() {
        assert_eq!(render("50% there", &bindings()), "50% there");
        assert_eq!(render("ends with %", &bindings()), "ends with %");
    }
}
