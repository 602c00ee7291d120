//! Literal `{{key}}` substitution for installed hook scripts.
//!
//! Hooks are arbitrary scripts (shell, python) and may contain braces of their
//! own, so they are not run through tera. Only exact `{{key}}` markers whose
//! key is known are replaced; everything else is left untouched.

/// Replace every `{{key}}` in `text` with its value from `settings`.
pub fn substitute<'a, I>(text: &str, settings: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = text.to_owned();
    for (key, value) in settings {
        let marker = format!("{{{{{key}}}}}");
        if out.contains(&marker) {
            out = out.replace(&marker, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_markers_replaced_unknown_kept() {
        let text = "#!/bin/sh\nURL={{public_url}}\nfoo() { echo {{other}}; }\n";
        let out = substitute(text, [("public_url", "https://review.example.com")]);
        assert_eq!(
            out,
            "#!/bin/sh\nURL=https://review.example.com\nfoo() { echo {{other}}; }\n"
        );
    }

    #[test]
    fn spaced_markers_are_not_placeholders() {
        let out = substitute("{{ admin }}", [("admin", "x")]);
        assert_eq!(out, "{{ admin }}");
    }
}
