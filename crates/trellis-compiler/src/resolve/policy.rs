//! Per-front-end scoping policy.
//!
//! The three front-ends share one resolver but disagree on a handful of
//! scoping rules. Each rule is an independent flag so a front-end can mix
//! them freely; the presets capture the three shipped languages.

/// Scoping rules that vary between front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendPolicy {
    /// Same-scope redeclaration replaces the earlier binding instead of
    /// failing.
    pub allow_same_scope_redeclaration: bool,
    /// A counted loop's control variable outlives the loop, holding its
    /// successor value.
    pub loop_variable_persists: bool,
    /// Type aliases declared inside a routine become visible at module
    /// scope after their declaration.
    pub local_types_leak: bool,
    /// Folded constants declared inside a routine become visible at module
    /// scope after their declaration.
    pub local_consts_leak: bool,
    /// Constant initialisers must fold at compile time.
    pub const_requires_constant_initializer: bool,
}

impl FrontendPolicy {
    /// The imperative block-structured language.
    pub const fn pascal() -> Self {
        Self {
            allow_same_scope_redeclaration: false,
            loop_variable_persists: true,
            local_types_leak: true,
            local_consts_leak: true,
            const_requires_constant_initializer: true,
        }
    }

    /// The C-like language.
    pub const fn c_like() -> Self {
        Self {
            allow_same_scope_redeclaration: false,
            loop_variable_persists: false,
            local_types_leak: false,
            local_consts_leak: false,
            const_requires_constant_initializer: false,
        }
    }

    /// The module/closure-oriented language.
    pub const fn modular() -> Self {
        Self::c_like()
    }

    /// Look up a preset by front-end name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pascal" | "block" => Some(Self::pascal()),
            "clike" | "c-like" | "c" => Some(Self::c_like()),
            "modular" | "rea" | "module" => Some(Self::modular()),
            _ => None,
        }
    }
}

impl Default for FrontendPolicy {
    fn default() -> Self {
        Self::c_like()
    }
}
