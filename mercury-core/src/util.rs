use std::{
    any::Any,
    fmt::{self, Display},
    sync::PoisonError,
};

pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut first = true;
    for v in values {
        let position = out.len();
        f(out, v);
        if out.len() > position {
            if !first {
                out.insert_str(position, separator);
            }
            first = false;
        }
    }
}

/// Recover the guard of a poisoned lock. The protected state of this crate is
/// never left half-updated by a panicking holder.
pub fn unpoison<G>(result: Result<G, PoisonError<G>>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic payload".to_owned()
    }
}

/// Display adapter printing at most the first 497 bytes of a query.
pub struct Truncated<'a>(pub &'a str);

impl Display for Truncated<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = self.0;
        if query.len() <= 497 {
            return writeln!(f, "{}", query.trim_end());
        }
        let mut end = 497;
        while !query.is_char_boundary(end) {
            end -= 1;
        }
        writeln!(f, "{}...", query[..end].trim_end())
    }
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        $crate::Truncated(&$query)
    };
}

#[cfg(test)]
mod tests {
    use crate::{Truncated, panic_message, separated_by};

    #[test]
    fn truncates_on_char_boundaries() {
        let short = "SELECT 1;   ";
        assert_eq!(Truncated(short).to_string(), "SELECT 1;\n");
        let long = "é".repeat(300);
        let printed = Truncated(&long).to_string();
        assert!(printed.ends_with("...\n"));
        assert!(printed.len() <= 497 + 4);
    }

    #[test]
    fn separators_only_between_non_empty_items() {
        let mut out = String::from("(");
        separated_by(&mut out, ["a", "", "b"], |out, v| out.push_str(v), ", ");
        out.push(')');
        assert_eq!(out, "(a, b)");
        let mut out = String::from("(");
        separated_by(&mut out, ["", "a", "", ""], |out, v| out.push_str(v), ", ");
        out.push(')');
        assert_eq!(out, "(a)");
    }

    #[test]
    fn panic_payloads() {
        let payload = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
    }
}
