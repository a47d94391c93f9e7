//! Request tokenizer and response framing for PolyVault
//!
//! A request is one line of space-separated tokens: the operation name, the
//! key, then positional arguments. A token wrapped in double quotes may embed
//! spaces, and `""` inside quotes stands for a literal quote.

use crate::error::{PolyVaultError, Result};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::char,
    combinator::{all_consuming, map, value},
    multi::{fold_many0, separated_list1},
    sequence::delimited,
    IResult,
};
use serde_json::Value as Json;

/// A tokenized request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: String,
    pub key: String,
    pub args: Vec<String>,
}

/// Response to a single request line.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Operation result, written as JSON.
    Value(Json),
    /// Failure text, written verbatim.
    Error(String),
}

impl Response {
    /// Serialize response to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::Value(v) => format!("{}\n", v).into_bytes(),
            Response::Error(e) => format!("{}\n", e).into_bytes(),
        }
    }
}

impl From<PolyVaultError> for Response {
    fn from(err: PolyVaultError) -> Self {
        Response::Error(err.to_string())
    }
}

/// Tokenize a request line with its line terminator already stripped.
pub fn parse_request(line: &str) -> Result<Request> {
    if line.is_empty() {
        return Err(PolyVaultError::Protocol("empty request".to_string()));
    }

    let (_, tokens) = all_consuming(token_list)(line)?;
    let mut tokens = tokens.into_iter();

    let op = tokens.next().unwrap_or_default();
    let key = tokens
        .next()
        .ok_or_else(|| PolyVaultError::Protocol(format!("missing key for '{}'", op)))?;

    Ok(Request {
        op,
        key,
        args: tokens.collect(),
    })
}

/// Render a token so that [`parse_request`] reads it back unchanged.
pub fn quote_token(token: &str) -> String {
    if !token.is_empty() && !token.contains([' ', '"']) {
        return token.to_string();
    }
    format!("\"{}\"", token.replace('"', "\"\""))
}

/// Render a whole request line, without terminator.
pub fn format_request(op: &str, key: &str, args: &[String]) -> String {
    std::iter::once(op)
        .chain(std::iter::once(key))
        .chain(args.iter().map(String::as_str))
        .map(quote_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_list(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char(' '), token)(input)
}

fn token(input: &str) -> IResult<&str, String> {
    alt((quoted_token, bare_token))(input)
}

/// `"..."` with `""` as an escaped quote.
fn quoted_token(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((value("\"", tag("\"\"")), is_not("\""))),
            String::new,
            |mut acc, chunk| {
                acc.push_str(chunk);
                acc
            },
        ),
        char('"'),
    )(input)
}

/// Unquoted run of characters; may be empty between two separators.
fn bare_token(input: &str) -> IResult<&str, String> {
    map(take_while(|c| c != ' ' && c != '"'), String::from)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(op: &str, key: &str, args: &[&str]) -> Request {
        Request {
            op: op.to_string(),
            key: key.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_plain_request() {
        assert_eq!(
            parse_request("hset user name alice").unwrap(),
            request("hset", "user", &["name", "alice"])
        );
        assert_eq!(parse_request("lpop queue").unwrap(), request("lpop", "queue", &[]));
    }

    #[test]
    fn test_parse_quoted_tokens() {
        assert_eq!(
            parse_request(r#"set greeting "hello world""#).unwrap(),
            request("set", "greeting", &["hello world"])
        );
        assert_eq!(
            parse_request(r#"set "my key" "say ""hi""""#).unwrap(),
            request("set", "my key", &[r#"say "hi""#])
        );
        assert_eq!(parse_request(r#"set k """#).unwrap(), request("set", "k", &[""]));
    }

    #[test]
    fn test_consecutive_separators_yield_empty_token() {
        assert_eq!(
            parse_request("hset h  v").unwrap(),
            request("hset", "h", &["", "v"])
        );
    }

    #[test]
    fn test_illegal_quoting_is_rejected() {
        assert!(matches!(
            parse_request(r#"set k "unterminated"#),
            Err(PolyVaultError::Protocol(_))
        ));
        assert!(matches!(
            parse_request(r#"set k ab"c"#),
            Err(PolyVaultError::Protocol(_))
        ));
    }

    #[test]
    fn test_missing_key_and_empty_line() {
        assert!(matches!(parse_request("get"), Err(PolyVaultError::Protocol(_))));
        assert!(matches!(parse_request(""), Err(PolyVaultError::Protocol(_))));
    }

    #[test]
    fn test_format_request_reads_back() {
        let args = vec!["a b".to_string(), String::new(), "q\"".to_string()];
        let line = format_request("hset", "plain", &args);
        assert_eq!(line, r#"hset plain "a b" "" "q""""#);

        let parsed = parse_request(&line).unwrap();
        assert_eq!(parsed.args, args);
    }

    #[test]
    fn test_response_serialization() {
        assert_eq!(Response::Value(json!("hi!")).to_bytes(), b"\"hi!\"\n");
        assert_eq!(Response::Value(json!(null)).to_bytes(), b"null\n");
        assert_eq!(Response::Value(json!(["a", "b"])).to_bytes(), b"[\"a\",\"b\"]\n");
        assert_eq!(
            Response::from(PolyVaultError::NoSuchKey).to_bytes(),
            b"Error: that key does not exist\n"
        );
    }
}
