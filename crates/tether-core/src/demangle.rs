//! Symbol demangling utilities.
//!
//! This module provides functions to demangle symbol names and detect their
//! programming language, plus a helper that shortens the type names Rust
//! reports through [`std::any::type_name`] for compact diagnostics.
//!
//! ## Symbol Mangling
//!
//! Compilers "mangle" symbol names to encode type information and namespaces.
//! This module can demangle Rust names back to human-readable form:
//!
//! - **Rust**: legacy (`_ZN...E`) and v0 (`_R...`) schemes
//! - **C++**: Itanium ABI mangling (`_Z...`) is detected but left as is
//! - **C**: Typically unmangled (global symbols)

use std::fmt;

use rustc_demangle::try_demangle;

/// Programming language associated with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (detected via mangling or namespace patterns).
    Rust,
    /// C++ symbol (Itanium mangling without Rust extensions).
    Cpp,
    /// Unknown or unmangled (C, assembly, stripped).
    Unknown,
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A function name with demangling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    /// Demangle `raw` and classify its language.
    ///
    /// ```rust
    /// use tether_core::demangle::{SymbolLanguage, SymbolName};
    ///
    /// let name = SymbolName::parse("_ZN3foo3barE");
    /// assert_eq!(name.display_name(), "foo::bar");
    /// assert_eq!(name.language(), SymbolLanguage::Rust);
    /// ```
    pub fn parse(raw: impl Into<String>) -> Self
    {
        let raw = raw.into();
        let demangled = demangle(&raw);
        let language = symbol_language(&raw);
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Raw (possibly mangled) name as it was reported.
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    /// Demangled human-friendly name if available.
    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// Preferred presentation (demangled fallback to raw).
    pub fn display_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    /// Language classification for the symbol.
    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.display_name())
    }
}

/// Classify a raw symbol by its mangling pattern.
///
/// - Rust symbols: Start with `_R` or `_ZN`, or contain `::`
/// - C++ symbols: Start with `_Z` (Itanium mangling)
/// - Everything else is unknown
#[must_use]
pub fn symbol_language(raw: &str) -> SymbolLanguage
{
    if raw.starts_with("_R") || raw.starts_with("_ZN") || raw.contains("::") {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") {
        SymbolLanguage::Cpp
    } else {
        SymbolLanguage::Unknown
    }
}

/// Demangle a Rust symbol, without the trailing hash.
///
/// Returns `None` if `raw` is not a mangled Rust symbol.
#[must_use]
pub fn demangle(raw: &str) -> Option<String>
{
    try_demangle(raw).ok().map(|demangled| format!("{demangled:#}"))
}

/// Demangle a Rust symbol, falling back to the input unchanged.
#[must_use]
pub fn demangled_string(raw: &str) -> String
{
    demangle(raw).unwrap_or_else(|| raw.to_string())
}

/// Strip module paths from a type name, keeping its generic structure.
///
/// ```rust
/// use tether_core::demangle::short_type_name;
///
/// assert_eq!(short_type_name("alloc::vec::Vec<core::option::Option<u8>>"), "Vec<Option<u8>>");
/// assert_eq!(short_type_name("dyn bank::Shape"), "dyn Shape");
/// ```
#[must_use]
pub fn short_type_name(full: &str) -> String
{
    let mut short = String::with_capacity(full.len());
    // Start of the path segment being written, in `short`
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            if segment_start == short.len() {
                // `<T as Trait>::Assoc`: nothing to strip, keep the separator
                short.push_str("::");
                segment_start = short.len();
            } else {
                short.truncate(segment_start);
            }
            continue;
        }

        short.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            segment_start = short.len();
        }
    }

    short
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_demangle_legacy()
    {
        assert_eq!(demangle("_ZN4testE").as_deref(), Some("test"));
        assert_eq!(demangle("_ZN3foo3barE").as_deref(), Some("foo::bar"));
    }

    #[test]
    fn test_demangle_strips_hash()
    {
        assert_eq!(demangle("_ZN3foo3bar17h05af221e174051e9E").as_deref(), Some("foo::bar"));
    }

    #[test]
    fn test_demangled_string_passthrough()
    {
        assert_eq!(demangle("main"), None);
        assert_eq!(demangled_string("main"), "main");
        assert_eq!(demangled_string("_ZN3foo3barE"), "foo::bar");
    }

    #[test]
    fn test_symbol_language()
    {
        assert_eq!(symbol_language("_ZN3foo3barE"), SymbolLanguage::Rust);
        assert_eq!(symbol_language("_RNvC7mycrate4main"), SymbolLanguage::Rust);
        assert_eq!(symbol_language("std::rt::lang_start"), SymbolLanguage::Rust);
        assert_eq!(symbol_language("_Z3foov"), SymbolLanguage::Cpp);
        assert_eq!(symbol_language("malloc"), SymbolLanguage::Unknown);
    }

    #[test]
    fn test_symbol_name_cpp_keeps_raw()
    {
        let name = SymbolName::parse("_Z3foov");
        assert_eq!(name.demangled(), None);
        assert_eq!(name.display_name(), "_Z3foov");
        assert_eq!(name.language(), SymbolLanguage::Cpp);
        assert_eq!(name.to_string(), "_Z3foov");
    }

    #[test]
    fn test_short_type_name()
    {
        assert_eq!(short_type_name("u32"), "u32");
        assert_eq!(short_type_name("tether_core::subscribable::Subscribable"), "Subscribable");
        assert_eq!(
            short_type_name("std::collections::HashMap<alloc::string::String, (i32, core::cell::Cell<u8>)>"),
            "HashMap<String, (i32, Cell<u8>)>"
        );
        assert_eq!(short_type_name("&[core::option::Option<u8>; 4]"), "&[Option<u8>; 4]");
        assert_eq!(short_type_name("<T as core::ops::Deref>::Target"), "<T as Deref>::Target");
    }
}
