//! DIMCAS CNF parser and writer for the blitsat SAT solver.
//!
//! The parser works line by line. Comment lines start with `c`, an optional header line has the
//! form `p cnf <vars> <clauses>` and every clause is a whitespace separated list of nonzero
//! integers terminated by `0`. Clauses may span multiple lines.
use std::{borrow::Borrow, io};

use blitsat_formula::{CnfFormula, ExtendFormula, Lit, Var};

use anyhow::Error;
use thiserror::Error;

/// Possible errors while parsing a DIMACS CNF formula.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {line}: Unexpected token in DIMACS CNF input: '{token}'")]
    UnexpectedToken { line: usize, token: String },
    #[error("line {line}: Literal is out of range: {value}")]
    LiteralOutOfRange { line: usize, value: String },
    #[error("line {line}: Invalid header syntax: {header}")]
    InvalidHeader { line: usize, header: String },
    #[error("line {line}: Duplicate header")]
    DuplicateHeader { line: usize },
    #[error("line {line}: Unterminated clause")]
    UnterminatedClause { line: usize },
    #[error("Formula has {var_count} variables while the header specifies {header_var_count} variables")]
    VarCount {
        var_count: usize,
        header_var_count: usize,
    },
    #[error("Formula has {clause_count} clauses while the header specifies {header_clause_count} clauses")]
    ClauseCount {
        clause_count: usize,
        header_clause_count: usize,
    },
}

/// Variable and clause count present in a DIMACS CNF header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Parser for DIMACS CNF files.
///
/// Lines are fed one at a time using [`parse_line`](DimacsParser::parse_line), after the last line
/// [`finish`](DimacsParser::finish) checks for unterminated clauses and the header.
#[derive(Default)]
pub struct DimacsParser {
    formula: CnfFormula,
    partial_clause: Vec<Lit>,
    header: Option<DimacsHeader>,
    line_number: usize,
    clause_count: usize,
    /// Set after a `%` line, which terminates the formula in some benchmark collections.
    end_marker: bool,
}

impl DimacsParser {
    /// Create a new DIMACS CNF parser.
    pub fn new() -> DimacsParser {
        DimacsParser::default()
    }

    /// Parse the given input and check the header if present.
    pub fn parse(input: impl io::Read) -> Result<CnfFormula, Error> {
        use io::BufRead;

        let mut parser = Self::new();
        for line in io::BufReader::new(input).lines() {
            parser.parse_line(&line?)?;
        }
        parser.finish()?;

        Ok(parser.formula)
    }

    /// Parse a single line of input.
    pub fn parse_line(&mut self, line: &str) -> Result<(), ParserError> {
        self.line_number += 1;

        let trimmed = line.trim_start();
        if trimmed.starts_with('%') {
            self.end_marker = true;
        }
        if self.end_marker || trimmed.starts_with('c') {
            return Ok(());
        }
        if trimmed.starts_with('p') {
            return self.parse_header(trimmed);
        }

        for token in trimmed.split_whitespace() {
            let value: isize = token.parse().map_err(|_| {
                if token.bytes().all(|byte| byte == b'-' || byte.is_ascii_digit()) {
                    ParserError::LiteralOutOfRange {
                        line: self.line_number,
                        value: token.to_owned(),
                    }
                } else {
                    ParserError::UnexpectedToken {
                        line: self.line_number,
                        token: token.to_owned(),
                    }
                }
            })?;

            if value == 0 {
                self.formula.add_clause(&self.partial_clause);
                self.partial_clause.clear();
                self.clause_count += 1;
            } else if value.abs() as usize > Var::max_count() {
                return Err(ParserError::LiteralOutOfRange {
                    line: self.line_number,
                    value: token.to_owned(),
                });
            } else {
                self.partial_clause.push(Lit::from_dimacs(value));
            }
        }

        Ok(())
    }

    /// Finish parsing and verify the header information when present.
    pub fn finish(&mut self) -> Result<(), ParserError> {
        if !self.partial_clause.is_empty() {
            return Err(ParserError::UnterminatedClause {
                line: self.line_number,
            });
        }

        if let Some(header) = self.header {
            let var_count = self.formula.var_count();
            if var_count > header.var_count {
                return Err(ParserError::VarCount {
                    var_count,
                    header_var_count: header.var_count,
                });
            }

            if self.clause_count != header.clause_count {
                return Err(ParserError::ClauseCount {
                    clause_count: self.clause_count,
                    header_clause_count: header.clause_count,
                });
            }
        }

        Ok(())
    }

    /// Return the DIMACS CNF header data if present.
    pub fn header(&self) -> Option<DimacsHeader> {
        self.header
    }

    /// Number of clauses parsed.
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    /// The formula parsed so far.
    pub fn formula(&self) -> &CnfFormula {
        &self.formula
    }

    fn parse_header(&mut self, line: &str) -> Result<(), ParserError> {
        if self.header.is_some() {
            return Err(ParserError::DuplicateHeader {
                line: self.line_number,
            });
        }

        let invalid = || ParserError::InvalidHeader {
            line: self.line_number,
            header: line.to_owned(),
        };

        let mut values = line.split_whitespace();
        if values.next() != Some("p") || values.next() != Some("cnf") {
            return Err(invalid());
        }

        let mut count = || -> Result<usize, ParserError> {
            values
                .next()
                .and_then(|value| value.parse().ok())
                .ok_or_else(invalid)
        };

        let var_count = count()?;
        let clause_count = count()?;

        if values.next().is_some() {
            return Err(invalid());
        }

        if var_count > Var::max_count() {
            return Err(ParserError::LiteralOutOfRange {
                line: self.line_number,
                value: var_count.to_string(),
            });
        }

        self.header = Some(DimacsHeader {
            var_count,
            clause_count,
        });
        self.formula.set_var_count(var_count);

        Ok(())
    }
}

/// Write a DIMACS CNF header.
pub fn write_dimacs_header(target: &mut impl io::Write, header: DimacsHeader) -> io::Result<()> {
    writeln!(
        target,
        "p cnf {} {}",
        header.var_count, header.clause_count
    )
}

/// Write an iterator of clauses as headerless DIMACS CNF.
pub fn write_dimacs_clauses(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = impl IntoIterator<Item = impl Borrow<Lit>>>,
) -> io::Result<()> {
    for clause in clauses.into_iter() {
        for lit in clause.into_iter() {
            itoa::write(&mut *target, lit.borrow().to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Write a formula as DIMACS CNF.
pub fn write_dimacs(target: &mut impl io::Write, formula: &CnfFormula) -> io::Result<()> {
    write_dimacs_header(
        &mut *target,
        DimacsHeader {
            var_count: formula.var_count(),
            clause_count: formula.len(),
        },
    )?;
    write_dimacs_clauses(&mut *target, formula.iter())
}

/// Write a satisfying assignment as `v` lines in the SAT competition format.
pub fn write_model(target: &mut impl io::Write, model: &[Lit]) -> io::Result<()> {
    for chunk in model.chunks(16) {
        target.write_all(b"v")?;
        for lit in chunk {
            target.write_all(b" ")?;
            itoa::write(&mut *target, lit.to_dimacs())?;
        }
        target.write_all(b"\n")?;
    }
    target.write_all(b"v 0\n")
}
