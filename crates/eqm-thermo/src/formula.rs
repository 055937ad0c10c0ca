//! Chemical formula parsing and atomic masses.

use crate::composition::Composition;
use crate::error::{ThermoError, ThermoResult};

/// Standard atomic weight [g/mol] of an element, if tabulated.
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    let mass = match symbol {
        "H" => 1.008,
        "He" => 4.002_602,
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        "F" => 18.998_403,
        "Ne" => 20.1797,
        "Na" => 22.989_769,
        "Mg" => 24.305,
        "Al" => 26.981_538,
        "Si" => 28.085,
        "P" => 30.973_762,
        "S" => 32.06,
        "Cl" => 35.45,
        "Ar" => 39.948,
        "K" => 39.0983,
        "Ca" => 40.078,
        "Ti" => 47.867,
        "Cr" => 51.9961,
        "Mn" => 54.938_044,
        "Fe" => 55.845,
        "Kr" => 83.798,
        "Xe" => 131.293,
        _ => return None,
    };
    Some(mass)
}

/// Molar mass [g/mol] of an element-keyed composition.
pub fn molar_mass_of_elements(elements: &Composition) -> ThermoResult<f64> {
    elements.iter().try_fold(0.0, |acc, (symbol, count)| {
        let mass = atomic_mass(symbol).ok_or_else(|| ThermoError::UnknownSpecies {
            species: symbol.to_string(),
        })?;
        Ok(acc + mass * count)
    })
}

/// Parse a formula such as `CH4`, `Ca3SiO5` or `Ca(OH)2` into element counts.
pub fn parse_formula(formula: &str) -> ThermoResult<Composition> {
    let chars: Vec<char> = formula.chars().collect();
    let mut parser = Parser {
        formula,
        chars: &chars,
        pos: 0,
    };
    let elements = parser.group(0)?;
    if parser.pos != chars.len() {
        return Err(parser.error("unbalanced ')'"));
    }
    if elements.is_empty() {
        return Err(parser.error("no elements"));
    }
    Ok(elements)
}

struct Parser<'a> {
    formula: &'a str,
    chars: &'a [char],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> ThermoError {
        ThermoError::Formula {
            formula: self.formula.to_string(),
            reason: format!("{reason} at position {}", self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn group(&mut self, depth: usize) -> ThermoResult<Composition> {
        let mut acc = Composition::new();
        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    self.pos += 1;
                    let inner = self.group(depth + 1)?;
                    if self.peek() != Some(')') {
                        return Err(self.error("missing ')'"));
                    }
                    self.pos += 1;
                    let count = self.count()?;
                    acc = &acc + &inner.scale(count);
                }
                ')' if depth > 0 => break,
                ')' => return Err(self.error("unexpected ')'")),
                c if c.is_ascii_uppercase() => {
                    let symbol = self.symbol();
                    if atomic_mass(&symbol).is_none() {
                        return Err(self.error(&format!("unknown element '{symbol}'")));
                    }
                    let count = self.count()?;
                    acc = &acc + &Composition::from_pairs([(symbol, count)]);
                }
                _ => return Err(self.error(&format!("unexpected '{c}'"))),
            }
        }
        Ok(acc)
    }

    fn symbol(&mut self) -> String {
        let mut symbol = String::new();
        symbol.push(self.chars[self.pos]);
        self.pos += 1;
        while let Some(c) = self.peek() {
            if !c.is_ascii_lowercase() {
                break;
            }
            symbol.push(c);
            self.pos += 1;
        }
        symbol
    }

    fn count(&mut self) -> ThermoResult<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(1.0);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse::<f64>()
            .map_err(|_| self.error(&format!("bad count '{digits}'")))
    }
}
