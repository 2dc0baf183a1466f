//! Parsers for the three configuration mini-languages. Each turns one
//! configuration string into a typed description; name resolution against
//! models, datasets and categories happens later, in the builder.
//!
//! ```text
//! physModels := [IndexCat ":"] ModelRef {ModelRef}      ModelRef := Name | Name "=" Name
//! splitCats  := CatRef {CatRef}                         CatRef   := Cat ["(" Label {"," Label} ")"]
//! <model>    := Rule {Rule}                             Rule     := Cat{","Cat} ":" Param{","Param}[","]
//! ```
//!
//! Tokens are whitespace separated. A parameter list ending in a comma
//! continues into the next token.
use super::error::ParseError;
use std::fmt;

pub const PHYS_MODELS: &str = "physModels";
pub const SPLIT_CATS: &str = "splitCats";

/// One entry of the physics model list. For `A=B` the orientation is not
/// known until the names are checked against the prototype models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    Plain(String),
    Mapped { left: String, right: String },
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Plain(name) => f.write_str(name),
            ModelRef::Mapped { left, right } => write!(f, "{left}={right}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhysModelsLine {
    pub index_category: Option<String>,
    pub models: Vec<ModelRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatRef {
    pub name: String,
    pub states: Option<Vec<String>>,
}

/// A splitting rule: every listed parameter is split by the product of the
/// listed categories (a single category when only one is named).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRule {
    pub categories: Vec<String>,
    pub params: Vec<String>,
}

fn comma_list(token: &str) -> Vec<String> {
    token.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn malformed(field: &str, token: &str, reason: &'static str) -> ParseError {
    ParseError::MalformedToken { field: field.to_string(), token: token.to_string(), reason }
}

pub fn parse_phys_models(line: &str) -> Result<PhysModelsLine, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let empty = || ParseError::Empty { field: PHYS_MODELS.to_string() };

    let (index_category, rest) = match tokens.iter().position(|t| *t == ":") {
        Some(1) => (Some(tokens[0].to_string()), &tokens[2..]),
        Some(pos) => {
            return Err(ParseError::MisplacedColon {
                field: PHYS_MODELS.to_string(),
                token: tokens[..=pos].join(" "),
            })
        }
        None => (None, &tokens[..]),
    };

    let mut models = Vec::with_capacity(rest.len());
    for &token in rest {
        if token.contains(':') {
            return Err(ParseError::MisplacedColon { field: PHYS_MODELS.to_string(), token: token.to_string() });
        }
        let model = match token.split_once('=') {
            Some((left, right)) => {
                if left.is_empty() || right.is_empty() || right.contains('=') {
                    return Err(malformed(PHYS_MODELS, token, "expected <state>=<model>"));
                }
                ModelRef::Mapped { left: left.to_string(), right: right.to_string() }
            }
            None => ModelRef::Plain(token.to_string()),
        };
        models.push(model);
    }

    if models.is_empty() {
        return Err(empty());
    }
    Ok(PhysModelsLine { index_category, models })
}

/// An empty line is valid: a build may be split by its index category alone.
pub fn parse_split_cats(line: &str) -> Result<Vec<CatRef>, ParseError> {
    line.split_whitespace().map(parse_cat_ref).collect()
}

fn parse_cat_ref(token: &str) -> Result<CatRef, ParseError> {
    if token.contains(':') {
        return Err(ParseError::MisplacedColon { field: SPLIT_CATS.to_string(), token: token.to_string() });
    }
    let Some((name, tail)) = token.split_once('(') else {
        if token.contains(')') {
            return Err(malformed(SPLIT_CATS, token, "unbalanced ')'"));
        }
        return Ok(CatRef { name: token.to_string(), states: None });
    };

    let Some(list) = tail.strip_suffix(')') else {
        return Err(malformed(SPLIT_CATS, token, "state list must end with ')'"));
    };
    if name.is_empty() {
        return Err(malformed(SPLIT_CATS, token, "missing category name"));
    }
    if list.contains(['(', ')']) {
        return Err(malformed(SPLIT_CATS, token, "nested parentheses"));
    }
    let states = comma_list(list);
    if states.is_empty() {
        return Err(malformed(SPLIT_CATS, token, "empty state list"));
    }
    Ok(CatRef { name: name.to_string(), states: Some(states) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Category,
    Colon,
    Params,
}

/// Parses the splitting rules of the model named `model`.
pub fn parse_rules(model: &str, line: &str) -> Result<Vec<SplitRule>, ParseError> {
    let mut rules = Vec::new();
    let mut expect = Expect::Category;
    let mut categories = Vec::new();
    let mut params = Vec::new();
    let mut last = "";

    for token in line.split_whitespace() {
        match expect {
            Expect::Category => {
                if token.contains(':') {
                    return Err(ParseError::MisplacedColon { field: model.to_string(), token: token.to_string() });
                }
                categories = comma_list(token);
                if categories.is_empty() {
                    return Err(malformed(model, token, "empty category list"));
                }
                expect = Expect::Colon;
            }
            Expect::Colon => {
                if token != ":" && token.contains(':') {
                    return Err(ParseError::MisplacedColon { field: model.to_string(), token: token.to_string() });
                }
                if token != ":" {
                    return Err(ParseError::ExpectedColon {
                        field: model.to_string(),
                        after: last.to_string(),
                        found: token.to_string(),
                    });
                }
                expect = Expect::Params;
            }
            Expect::Params => {
                if token.contains(':') {
                    return Err(ParseError::MisplacedColon { field: model.to_string(), token: token.to_string() });
                }
                params.extend(comma_list(token));
                if !token.ends_with(',') {
                    if params.is_empty() {
                        return Err(malformed(model, token, "empty parameter list"));
                    }
                    rules.push(SplitRule {
                        categories: std::mem::take(&mut categories),
                        params: std::mem::take(&mut params),
                    });
                    expect = Expect::Category;
                }
            }
        }
        last = token;
    }

    let expected = match expect {
        Expect::Category => return Ok(rules),
        Expect::Colon => "':'",
        Expect::Params => "parameter list",
    };
    Err(ParseError::UnexpectedEnd { field: model.to_string(), expected, after: last.to_string() })
}
