/// Make a route name safe to use as a file name. Alphanumerics, spaces,
/// dashes and underscores pass through, everything else becomes `_`, and
/// surrounding whitespace is trimmed.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}
