/// A `&'static Regex` compiled once on first use. The pattern is a literal,
/// so a compile failure is a bug in this crate and panics.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}
