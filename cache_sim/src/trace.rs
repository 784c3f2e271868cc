use std::num::IntErrorKind;

use nom::{
    bytes::complete::take_till1, character::complete::multispace0, sequence::preceded, IResult,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("token #{position} `{token}` is not an unsigned decimal address")]
    Malformed { position: usize, token: String },
    #[error("token #{position} `{token}` does not fit in a 32-bit address")]
    OutOfRange { position: usize, token: String },
}

impl TraceError {
    /// 0-based index of the rejected token.
    pub fn position(&self) -> usize {
        match self {
            TraceError::Malformed { position, .. } | TraceError::OutOfRange { position, .. } => {
                *position
            }
        }
    }
}

/// Sequence of addresses in the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    addrs: Vec<u32>,
}

impl Trace {
    pub fn new(addrs: Vec<u32>) -> Self {
        Self { addrs }
    }
    /// parses whitespace separated decimal addresses; fails on the first bad token.
    pub fn parse(trace_str: &str) -> Result<Self, TraceError> {
        match Self::parse_prefix(trace_str) {
            (trace, None) => Ok(trace),
            (_, Some(e)) => Err(e),
        }
    }
    /// parses addresses up to the first bad token, returning the error that stopped it.
    pub fn parse_prefix(trace_str: &str) -> (Self, Option<TraceError>) {
        let mut addrs = Vec::new();
        let mut input = trace_str;
        while let Ok((rest, token)) = read_token(input) {
            match parse_addr(addrs.len(), token) {
                Ok(addr) => addrs.push(addr),
                Err(e) => return (Self { addrs }, Some(e)),
            }
            input = rest;
        }
        (Self { addrs }, None)
    }
    pub fn addresses(&self) -> &[u32] {
        &self.addrs
    }
    pub fn len(&self) -> usize {
        self.addrs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl IntoIterator for Trace {
    type Item = u32;

    type IntoIter = <Vec<u32> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a u32;

    type IntoIter = std::slice::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.iter()
    }
}

fn read_token(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_till1(|c: char| c.is_whitespace()))(input)
}

fn parse_addr(position: usize, token: &str) -> Result<u32, TraceError> {
    token.parse::<u32>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => TraceError::OutOfRange {
            position,
            token: token.to_owned(),
        },
        _ => TraceError::Malformed {
            position,
            token: token.to_owned(),
        },
    })
}
