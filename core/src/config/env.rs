//! the "generator" asked for by Design Note §9: a declarative schema of
//! `{env suffix, field path, type}` triples expands into a parse-and-apply
//! routine, with no runtime reflection.

use std::fmt;

#[derive(Debug)]
pub enum EnvOverrideError {
    InvalidEnumValue(String),
}

impl fmt::Display for EnvOverrideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnumValue(v) => write!(f, "`{v}` is not a recognized constant name"),
        }
    }
}

impl std::error::Error for EnvOverrideError {}

/// `env_override!(self, root, { "SUFFIX" => a.b.c: Type, ... })` checks
/// `{root}_SUFFIX` for each entry and, if set, parses it via `Type: FromStr`
/// and assigns `self.a.b.c`. Stops at the first value that fails to parse.
macro_rules! env_override {
    ($self:expr, $root:expr, { $($suffix:literal => $($path:ident).+ : $ty:ty),* $(,)? }) => {{
        let root: &str = $root;
        (|| -> $crate::error::Result<()> {
            $(
                let key = format!("{root}_{}", $suffix);
                if let Ok(raw) = ::std::env::var(&key) {
                    let parsed: $ty = raw
                        .parse()
                        .map_err(|e| $crate::error::Error::ConfigInvalid(format!("{key}: {e}")))?;
                    $self.$($path).+ = parsed;
                }
            )*
            Ok(())
        })()
    }};
}

pub(crate) use env_override;
