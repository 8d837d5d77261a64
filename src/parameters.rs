//! Placeholder detection, validation and rewriting.
//!
//! # Placeholder styles
//!
//! | Style                 | Syntax      | Binds by |
//! |-----------------------|-------------|----------|
//! | `Qmark`               | `?`         | position |
//! | `Numeric`             | `$1`        | index    |
//! | `PositionalColon`     | `:1`        | index    |
//! | `PyformatPositional`  | `%s`        | position |
//! | `NamedColon`          | `:name`     | name     |
//! | `NamedAt`             | `@name`     | name     |
//! | `NamedDollar`         | `$name`     | name     |
//! | `PyformatNamed`       | `%(name)s`  | name     |

mod converter;
mod style;
mod tokenizer;
mod validator;
mod value;

pub use converter::{
    CanonicalSql, MARKER_PREFIX, ParamSource, ParameterConverter, RenderedSql, marker_name
};
pub use style::{ParameterInfo, ParameterStyle};
pub use tokenizer::{
    Lexeme, ParameterTokenizer, find_comments, lexemes, mask_literals, split_statements, tokenize
};
pub use validator::{
    ParameterValidator, dominant_style, expected_shape, positional_key, slot_count
};
pub use value::{ParameterShape, ParameterValue, Parameters};
