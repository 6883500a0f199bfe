//! Node names known to the cleaner
//!
//! Parser output uses string node names. They are resolved once, at load time,
//! into a closed enumeration so rules can match exhaustively.

use std::fmt;

/// Prefix for math-markup node names.
pub const MML_PREFIX: &str = "mml:";

macro_rules! tags {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Semantic role of an element or symbol node.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Tag {
            $($variant,)*
            /// Math-markup element, holds the full `mml:`-prefixed name
            MathMl(String),
            /// Any name without dedicated handling
            Other(String),
        }

        impl Tag {
            /// Resolve a node name.
            pub fn from_name(name: &str) -> Self {
                match name {
                    $($name => Tag::$variant,)*
                    n if n.starts_with(MML_PREFIX) && n.len() > MML_PREFIX.len() => {
                        Tag::MathMl(n.to_string())
                    }
                    n => Tag::Other(n.to_string()),
                }
            }

            /// The node name this tag was resolved from.
            pub fn as_str(&self) -> &str {
                match self {
                    $(Tag::$variant => $name,)*
                    Tag::MathMl(name) | Tag::Other(name) => name,
                }
            }
        }
    };
}

tags! {
    Document => "document",
    Par => "par",
    Quote => "quote",
    Quotation => "quotation",
    Exercise => "exercise",
    Figure => "figure",
    Math => "math",
    DisplayMath => "displaymath",
    EqnArray => "eqnarray",
    EqnArrayStar => "eqnarray*",
    Index => "index",
    Label => "label",
    Itemize => "itemize",
    Description => "description",
    Enumerate => "enumerate",
    Verbatim => "verbatim",
    CenterLine => "centerline",
    Table => "table",
    MathIt => "mathit",
    InlineEquation => "inlineequation",
    InformalEquation => "informalequation",
    Sum => "sum",
    Int => "int",
    Frac => "frac",
    Cases => "cases",
    Matrix => "matrix",
    PMatrix => "pmatrix",
}

impl Tag {
    /// Math containers that must not survive cleaning.
    pub fn is_math(&self) -> bool {
        matches!(
            self,
            Tag::Math | Tag::DisplayMath | Tag::EqnArray | Tag::EqnArrayStar
        )
    }

    /// Containers whose bare content has to be wrapped in a paragraph.
    pub fn is_quote_like(&self) -> bool {
        matches!(self, Tag::Quote | Tag::Quotation | Tag::Exercise)
    }

    /// Block-level content that cannot open a paragraph.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::Itemize
                | Tag::Description
                | Tag::Enumerate
                | Tag::Quote
                | Tag::Verbatim
                | Tag::Par
                | Tag::Figure
                | Tag::CenterLine
                | Tag::Label
                | Tag::Table
        )
    }

    /// Constructs that need real mathematical layout.
    pub fn needs_layout(&self) -> bool {
        matches!(
            self,
            Tag::Sum
                | Tag::Int
                | Tag::Frac
                | Tag::Cases
                | Tag::Matrix
                | Tag::PMatrix
                | Tag::EqnArray
                | Tag::EqnArrayStar
        )
    }

    /// Wrapper used for a translated math container, if `self` is one.
    pub fn equation_wrapper(&self) -> Option<Tag> {
        match self {
            Tag::Math => Some(Tag::InlineEquation),
            Tag::DisplayMath | Tag::EqnArray | Tag::EqnArrayStar => Some(Tag::InformalEquation),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
