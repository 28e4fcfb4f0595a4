//! The capability contracts a discovered class opts into, and the handle
//! the reflector reads classes through.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::error::Result;

use super::source::{ConstExpr, Visibility};

/// Bit set selecting which methods of a method-exposing class are indexed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodFilter(u32);

impl MethodFilter {
    pub const NONE: Self = Self(0);
    pub const PUBLIC: Self = Self(1);
    pub const PROTECTED: Self = Self(2);
    pub const PRIVATE: Self = Self(4);
    pub const STATIC: Self = Self(16);
    /// Non-static methods only.
    pub const OBJECTIVE: Self = Self(2048);
    /// Skip methods whose name starts with `__`.
    pub const EXCLUDE_MAGIC: Self = Self(4096);
    /// Skip methods without a `@purpose` doc tag.
    pub const PURPOSED_ONLY: Self = Self(8192);

    /// The bits that select by modifier before the other filters apply.
    pub const MODIFIERS: Self = Self(1 | 2 | 4 | 16);

    const NAMED: [(&'static str, MethodFilter); 7] = [
        ("PUBLIC", Self::PUBLIC),
        ("PROTECTED", Self::PROTECTED),
        ("PRIVATE", Self::PRIVATE),
        ("STATIC", Self::STATIC),
        ("OBJECTIVE", Self::OBJECTIVE),
        ("EXCLUDE_MAGIC", Self::EXCLUDE_MAGIC),
        ("PURPOSED_ONLY", Self::PURPOSED_ONLY),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether `method` survives the modifier, static, objective and
    /// magic-name filters. `PURPOSED_ONLY` needs the doc tags and is left to
    /// the caller.
    pub fn admits(self, method: &MethodInfo) -> bool {
        let modifiers = self & Self::MODIFIERS;
        if !modifiers.is_empty() {
            let selected = (modifiers.contains(Self::PUBLIC) && method.is_public())
                || (modifiers.contains(Self::PROTECTED) && method.is_protected())
                || (modifiers.contains(Self::PRIVATE) && method.is_private())
                || (modifiers.contains(Self::STATIC) && method.is_static);
            if !selected {
                return false;
            }
        }
        if self.contains(Self::STATIC) && !method.is_static {
            return false;
        }
        if self.contains(Self::OBJECTIVE) && method.is_static {
            return false;
        }
        if self.contains(Self::EXCLUDE_MAGIC) && method.is_magic() {
            return false;
        }
        true
    }
}

impl BitOr for MethodFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MethodFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MethodFilter {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "MethodFilter({})", self.0)
        } else {
            write!(f, "MethodFilter({})", names.join(" | "))
        }
    }
}

/// Values of the `FILTER_*` constants the method-exposing interface declares.
pub fn builtin_filter_constant(name: &str) -> Option<i64> {
    let value = match name {
        "FILTER_PUBLIC" => MethodFilter::PUBLIC,
        "FILTER_PROTECTED" => MethodFilter::PROTECTED,
        "FILTER_PRIVATE" => MethodFilter::PRIVATE,
        "FILTER_STATIC" => MethodFilter::STATIC,
        "FILTER_OBJECTIVE" => MethodFilter::OBJECTIVE,
        "FILTER_EXCLUDE_MAGIC" => MethodFilter::EXCLUDE_MAGIC,
        "FILTER_PURPOSED_ONLY" => MethodFilter::PURPOSED_ONLY,
        "FILTER_PUBLIC_STATIC" => MethodFilter::PUBLIC | MethodFilter::STATIC,
        "FILTER_PUBLIC_OBJECTIVE" => MethodFilter::PUBLIC | MethodFilter::OBJECTIVE,
        _ => return None,
    };
    Some(i64::from(value.bits()))
}

/// A method as seen on a linked class, inherited ones included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    /// Qualified name of the class whose body declares the method. Trait
    /// methods count as declared by the using class.
    pub declaring_class: String,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_deprecated: bool,
    pub return_type: Option<String>,
    pub(crate) returns: Option<ConstExpr>,
}

impl MethodInfo {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_protected(&self) -> bool {
        self.visibility == Visibility::Protected
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    pub fn is_magic(&self) -> bool {
        self.name.starts_with("__")
    }

    pub fn is_constructor(&self) -> bool {
        self.name.eq_ignore_ascii_case("__construct")
    }

    pub fn is_destructor(&self) -> bool {
        self.name.eq_ignore_ascii_case("__destruct")
    }
}

/// Classes that want to be indexed by purpose.
pub trait ExposeClass {
    /// Purpose tags the class registers under.
    fn purposes(&self) -> Result<Vec<String>>;
}

/// Classes that also want selected methods indexed.
pub trait ExposeClassMethods: ExposeClass {
    fn method_filter_options(&self) -> Result<MethodFilter>;
}

/// Read access to a resolved class.
pub trait TypeHandle {
    fn qualified_name(&self) -> &str;

    fn parent(&self) -> Option<&dyn TypeHandle>;

    /// Concrete class whose constructor is public.
    fn is_instantiable(&self) -> bool;

    fn doc_comment(&self) -> Option<&str>;

    /// Every callable method: own, trait and inherited non-private ones.
    fn methods(&self) -> &[MethodInfo];

    fn exposable(&self) -> Option<&dyn ExposeClass>;

    fn method_exposable(&self) -> Option<&dyn ExposeClassMethods>;
}
