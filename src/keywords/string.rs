//! String keywords. Lengths count Unicode scalar values.

use serde_json::Value;

use super::checkers::{NonNegativeInteger, PatternValue};
use super::{construction_error, u64_value, KeywordValidator};
use crate::context::ValidationContext;
use crate::digest::SimpleDigester;
use crate::ecma::EcmaRegex;
use crate::error::EngineError;
use crate::library::{Keyword, LibraryBuilder};
use crate::types::{Dialect, TypeSet};

pub(crate) fn register(builder: &mut LibraryBuilder, _dialect: Dialect) {
    builder
        .add_keyword(
            Keyword::new("minLength")
                .with_syntax(NonNegativeInteger)
                .with_digester(SimpleDigester::new("minLength", TypeSet::STRING))
                .with_validator(|fragment| {
                    Ok(MinLength {
                        limit: u64_value("minLength", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("maxLength")
                .with_syntax(NonNegativeInteger)
                .with_digester(SimpleDigester::new("maxLength", TypeSet::STRING))
                .with_validator(|fragment| {
                    Ok(MaxLength {
                        limit: u64_value("maxLength", fragment)?,
                    })
                }),
        )
        .add_keyword(
            Keyword::new("pattern")
                .with_syntax(PatternValue)
                .with_digester(SimpleDigester::new("pattern", TypeSet::STRING))
                .with_validator(Pattern::from_fragment),
        );
}

fn length(value: &str) -> u64 {
    value.chars().count() as u64
}

/// `minLength`
#[derive(Debug, Clone)]
pub struct MinLength {
    limit: u64,
}

impl KeywordValidator for MinLength {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(s) = instance.as_str() else {
            return Ok(());
        };
        let found = length(s);
        if found < self.limit {
            let message = ctx
                .error(format!(
                    "string \"{}\" is too short (length: {}, required minimum: {})",
                    s, found, self.limit
                ))
                .put("value", s)
                .put("found", found)
                .put("minLength", self.limit);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `maxLength`
#[derive(Debug, Clone)]
pub struct MaxLength {
    limit: u64,
}

impl KeywordValidator for MaxLength {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(s) = instance.as_str() else {
            return Ok(());
        };
        let found = length(s);
        if found > self.limit {
            let message = ctx
                .error(format!(
                    "string \"{}\" is too long (length: {}, maximum allowed: {})",
                    s, found, self.limit
                ))
                .put("value", s)
                .put("found", found)
                .put("maxLength", self.limit);
            ctx.push(message);
        }
        Ok(())
    }
}

/// `pattern`: unanchored ECMA-262 search.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: EcmaRegex,
}

impl Pattern {
    fn from_fragment(fragment: &Value) -> Result<Self, EngineError> {
        let pattern = fragment
            .as_str()
            .ok_or_else(|| construction_error("pattern", "expected a string"))?;
        Ok(Self {
            regex: EcmaRegex::new(pattern)?,
        })
    }
}

impl KeywordValidator for Pattern {
    fn validate(&self, ctx: &mut ValidationContext<'_>, instance: &Value) -> Result<(), EngineError> {
        let Some(s) = instance.as_str() else {
            return Ok(());
        };
        if !self.regex.is_match(s) {
            let message = ctx
                .error(format!(
                    "ECMA 262 regex \"{}\" does not match input string \"{}\"",
                    self.regex.as_str(),
                    s
                ))
                .put("regex", self.regex.as_str())
                .put("string", s);
            ctx.push(message);
        }
        Ok(())
    }
}
