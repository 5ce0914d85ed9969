//! Dimensional analysis for unit-tagged values
//!
//! A small quantity engine: it understands the units a culture
//! configuration actually uses (volumes, amounts, masses, times, temperatures,
//! counts) and the expression grammar needed to combine them:
//!
//! ```text
//! expr    := product
//! product := power ( ('*' | '/' | <whitespace>) power )*
//! power   := factor ( ('^' | '**') signed_number )?
//! factor  := number | identifier | '(' product ')'
//! ```
//!
//! Numeric literals contribute to the magnitude, identifiers contribute a
//! scale factor and a dimension vector over (length, mass, time, amount,
//! temperature). Conversion between two expressions succeeds only when their
//! dimension vectors are identical.
//!
//! # Example
//!
//! ```rust
//! use cho_rs::parameters::units::Quantity;
//!
//! let rate = Quantity::parse("4.8 1/day").unwrap();
//! assert!((rate.to("1/hr").unwrap() - 0.2).abs() < 1e-12);
//!
//! // Volume is not a rate
//! assert!(Quantity::parse("2 L").unwrap().to("1/hr").is_err());
//! ```

use crate::error::{Result, SimulationError};

/// Number of base dimensions tracked
const N_DIMS: usize = 5;

/// Dimension exponents over (length, mass, time, amount, temperature)
pub type Dimensions = [f64; N_DIMS];

const DIMENSIONLESS: Dimensions = [0.0; N_DIMS];
const LENGTH: Dimensions = [1.0, 0.0, 0.0, 0.0, 0.0];
const VOLUME: Dimensions = [3.0, 0.0, 0.0, 0.0, 0.0];
const MASS: Dimensions = [0.0, 1.0, 0.0, 0.0, 0.0];
const TIME: Dimensions = [0.0, 0.0, 1.0, 0.0, 0.0];
const AMOUNT: Dimensions = [0.0, 0.0, 0.0, 1.0, 0.0];
const MOLARITY: Dimensions = [-3.0, 0.0, 0.0, 1.0, 0.0];
const TEMPERATURE: Dimensions = [0.0, 0.0, 0.0, 0.0, 1.0];

/// Scale of one litre in cubic metres
const LITRE: f64 = 1e-3;

// =================================================================================================
// Unit table
// =================================================================================================

/// Multiplicative unit: value_in_SI = value · scale
#[derive(Debug, Clone, Copy)]
struct UnitDef {
    scale: f64,
    dims: Dimensions,
}

fn lookup_unit(name: &str) -> Option<UnitDef> {
    let (scale, dims) = match name {
        // Volume and length
        "L" | "l" | "liter" | "litre" | "liters" | "litres" => (LITRE, VOLUME),
        "mL" | "ml" | "milliliter" | "millilitre" => (LITRE * 1e-3, VOLUME),
        "uL" | "µL" | "ul" | "microliter" => (LITRE * 1e-6, VOLUME),
        "m" | "meter" | "metre" => (1.0, LENGTH),
        "dm" => (1e-1, LENGTH),
        "cm" => (1e-2, LENGTH),
        "mm" => (1e-3, LENGTH),

        // Amount of substance
        "mol" | "mole" => (1.0, AMOUNT),
        "mmol" | "millimole" => (1e-3, AMOUNT),
        "umol" | "µmol" | "micromole" => (1e-6, AMOUNT),
        "nmol" | "nanomole" => (1e-9, AMOUNT),
        "M" | "molar" => (1.0 / LITRE, MOLARITY),
        "mM" | "millimolar" => (1e-3 / LITRE, MOLARITY),
        "uM" | "µM" | "micromolar" => (1e-6 / LITRE, MOLARITY),

        // Mass
        "kg" | "kilogram" => (1.0, MASS),
        "g" | "gram" => (1e-3, MASS),
        "mg" | "milligram" => (1e-6, MASS),
        "ug" | "µg" | "microgram" => (1e-9, MASS),
        "ng" | "nanogram" => (1e-12, MASS),
        "pg" | "picogram" => (1e-15, MASS),

        // Time
        "s" | "sec" | "second" | "seconds" => (1.0, TIME),
        "min" | "minute" | "minutes" => (60.0, TIME),
        "h" | "hr" | "hour" | "hours" => (3600.0, TIME),
        "d" | "day" | "days" => (86400.0, TIME),

        // Temperature differences (absolute kelvin share the scale)
        "K" | "kelvin" | "delta_degC" => (1.0, TEMPERATURE),
        "delta_degF" => (5.0 / 9.0, TEMPERATURE),

        // Counts and pure numbers
        "dimensionless" | "cell" | "cells" => (1.0, DIMENSIONLESS),
        "percent" => (1e-2, DIMENSIONLESS),

        _ => return None,
    };
    Some(UnitDef { scale, dims })
}

/// Affine temperature scales: kelvin = (value + offset) · scale
fn lookup_offset_unit(name: &str) -> Option<(f64, f64)> {
    match name {
        "degC" | "celsius" | "°C" => Some((1.0, 273.15)),
        "degF" | "fahrenheit" | "°F" => Some((5.0 / 9.0, 459.67)),
        _ => None,
    }
}

// =================================================================================================
// Quantity
// =================================================================================================

/// Parsed unit expression
///
/// `magnitude` carries the product of numeric literals, `scale` the SI factor
/// of the unit identifiers. Keeping them apart makes conversion to the same
/// canonical unit exact: `5 mmol/L` read back in `mmol/L` multiplies 5 by a
/// ratio of bit-identical scales.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    magnitude: f64,
    scale: f64,
    dims: Dimensions,
    /// Affine temperature unit (scale, offset), only for bare `number unit` input
    offset: Option<(f64, f64)>,
    expression: String,
}

impl Quantity {
    /// Parse a unit-tagged value such as `"0.2 1/hr"` or `"36.4 degC"`
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();

        if let Some(quantity) = Self::parse_offset(trimmed)? {
            return Ok(quantity);
        }

        let tokens = tokenize(trimmed)?;
        let mut parser = Parser { tokens: &tokens, position: 0, expression: trimmed };
        let term = parser.product()?;
        if parser.position != tokens.len() {
            return Err(parse_error(trimmed, "unexpected trailing tokens"));
        }

        Ok(Self {
            magnitude: term.magnitude,
            scale: term.scale,
            dims: term.dims,
            offset: None,
            expression: trimmed.to_string(),
        })
    }

    /// `[number] degC`-style temperature expressions
    fn parse_offset(expression: &str) -> Result<Option<Self>> {
        let mut parts = expression.split_whitespace();
        let (magnitude, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1.0, unit),
            (Some(number), Some(unit), None) => match number.parse::<f64>() {
                Ok(value) => (value, unit),
                Err(_) => return Ok(None),
            },
            _ => {
                if expression.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '°')
                    .any(|word| lookup_offset_unit(word).is_some())
                {
                    return Err(parse_error(
                        expression,
                        "offset temperature units cannot be combined with other units",
                    ));
                }
                return Ok(None);
            }
        };

        match lookup_offset_unit(unit) {
            Some(offset) => Ok(Some(Self {
                magnitude,
                scale: 1.0,
                dims: TEMPERATURE,
                offset: Some(offset),
                expression: expression.to_string(),
            })),
            None => Ok(None),
        }
    }

    /// Dimension exponents of this quantity
    pub fn dimensions(&self) -> &Dimensions {
        &self.dims
    }

    /// Original expression, trimmed
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// True when both expressions measure the same physical dimension
    pub fn is_compatible(&self, other: &Quantity) -> bool {
        self.dims
            .iter()
            .zip(other.dims.iter())
            .all(|(a, b)| (a - b).abs() < 1e-9)
    }

    /// Convert into `target`, returning the magnitude expressed in that unit
    ///
    /// `target` may carry its own numeric factor (`"1/hr"`, `"100 mL"`): the
    /// result is the number of such target units.
    ///
    /// # Errors
    ///
    /// `UnitParse` if `target` is malformed, `Dimensionality` (with an empty
    /// field name) if the dimensions differ.
    pub fn to(&self, target: &str) -> Result<f64> {
        let target = Quantity::parse(target)?;
        self.to_quantity(&target)
    }

    /// Convert into an already-parsed target unit
    pub fn to_quantity(&self, target: &Quantity) -> Result<f64> {
        if !self.is_compatible(target) {
            return Err(SimulationError::Dimensionality {
                field: String::new(),
                from: self.expression.clone(),
                to: target.expression.clone(),
            });
        }

        match (self.offset, target.offset) {
            (None, None) => Ok(self.magnitude * (self.scale / target.scale) / target.magnitude),
            (Some(source_offset), Some(target_offset)) if source_offset == target_offset => {
                Ok(self.magnitude / target.magnitude)
            }
            (source_offset, target_offset) => {
                // Affine path: go through kelvin
                let kelvin = match source_offset {
                    Some((scale, offset)) => (self.magnitude + offset) * scale,
                    None => self.magnitude * self.scale,
                };
                let value = match target_offset {
                    Some((scale, offset)) => kelvin / scale - offset,
                    None => kelvin / target.scale,
                };
                Ok(value / target.magnitude)
            }
        }
    }
}

// =================================================================================================
// Tokenizer
// =================================================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Mul,
    Div,
    Pow,
    Open,
    Close,
    Minus,
    Plus,
    /// Whitespace between two factors (implicit multiplication)
    Juxtapose,
}

fn parse_error(expression: &str, reason: &str) -> SimulationError {
    SimulationError::UnitParse {
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut pending_space = false;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        let starts_factor = c.is_ascii_digit() || c == '.' || c.is_alphabetic() || c == '(' || c == 'µ';
        if pending_space
            && starts_factor
            && matches!(tokens.last(), Some(Token::Number(_) | Token::Ident(_) | Token::Close))
        {
            tokens.push(Token::Juxtapose);
        }
        pending_space = false;

        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Pow);
                    i += 2;
                } else {
                    tokens.push(Token::Mul);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Div);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Scientific notation: 1e-9, 2.5E3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '-' || chars[j] == '+') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| parse_error(expression, &format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' || c == 'µ' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == 'µ') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(parse_error(expression, &format!("unexpected character '{}'", other)));
            }
        }
    }

    if tokens.is_empty() {
        return Err(parse_error(expression, "empty expression"));
    }
    Ok(tokens)
}

// =================================================================================================
// Recursive-descent parser
// =================================================================================================

#[derive(Debug, Clone, Copy)]
struct Term {
    magnitude: f64,
    scale: f64,
    dims: Dimensions,
}

impl Term {
    fn one() -> Self {
        Self { magnitude: 1.0, scale: 1.0, dims: DIMENSIONLESS }
    }

    fn mul(self, rhs: Term) -> Self {
        let mut dims = self.dims;
        for (d, r) in dims.iter_mut().zip(rhs.dims.iter()) {
            *d += r;
        }
        Self {
            magnitude: self.magnitude * rhs.magnitude,
            scale: self.scale * rhs.scale,
            dims,
        }
    }

    fn div(self, rhs: Term) -> Self {
        self.mul(rhs.powf(-1.0))
    }

    fn powf(self, exponent: f64) -> Self {
        let mut dims = self.dims;
        for d in dims.iter_mut() {
            *d *= exponent;
        }
        Self {
            magnitude: self.magnitude.powf(exponent),
            scale: self.scale.powf(exponent),
            dims,
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    expression: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        self.position += 1;
        token
    }

    fn product(&mut self) -> Result<Term> {
        let mut term = self.power()?;
        loop {
            match self.peek() {
                Some(Token::Mul) | Some(Token::Juxtapose) => {
                    self.position += 1;
                    term = term.mul(self.power()?);
                }
                Some(Token::Div) => {
                    self.position += 1;
                    term = term.div(self.power()?);
                }
                _ => return Ok(term),
            }
        }
    }

    fn power(&mut self) -> Result<Term> {
        let base = self.factor()?;
        if let Some(Token::Pow) = self.peek() {
            self.position += 1;
            let exponent = self.signed_number()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn signed_number(&mut self) -> Result<f64> {
        let sign = match self.peek() {
            Some(Token::Minus) => {
                self.position += 1;
                -1.0
            }
            Some(Token::Plus) => {
                self.position += 1;
                1.0
            }
            _ => 1.0,
        };
        match self.advance() {
            Some(Token::Number(value)) => Ok(sign * value),
            Some(Token::Open) => {
                let value = self.signed_number()?;
                match self.advance() {
                    Some(Token::Close) => Ok(sign * value),
                    _ => Err(parse_error(self.expression, "unbalanced parenthesis in exponent")),
                }
            }
            _ => Err(parse_error(self.expression, "exponent must be a number")),
        }
    }

    fn factor(&mut self) -> Result<Term> {
        let expression = self.expression;
        match self.advance().cloned() {
            Some(Token::Number(value)) => Ok(Term { magnitude: value, ..Term::one() }),
            Some(Token::Minus) => {
                let inner = self.factor()?;
                Ok(Term { magnitude: -inner.magnitude, ..inner })
            }
            Some(Token::Ident(name)) => {
                if lookup_offset_unit(&name).is_some() {
                    return Err(parse_error(
                        expression,
                        "offset temperature units cannot be combined with other units",
                    ));
                }
                let unit = lookup_unit(&name)
                    .ok_or_else(|| parse_error(expression, &format!("unknown unit '{}'", name)))?;
                Ok(Term { magnitude: 1.0, scale: unit.scale, dims: unit.dims })
            }
            Some(Token::Open) => {
                let inner = self.product()?;
                match self.advance() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(parse_error(expression, "unbalanced parenthesis")),
                }
            }
            _ => Err(parse_error(expression, "expected a number, unit or '('")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rate_conversion() {
        let q = Quantity::parse("0.2 1/hr").unwrap();
        assert_relative_eq!(q.to("1/hr").unwrap(), 0.2);
        assert_relative_eq!(q.to("1/day").unwrap(), 4.8, epsilon = 1e-12);
    }

    #[test]
    fn test_concentration_conversion() {
        let q = Quantity::parse("1 mol/L").unwrap();
        assert_relative_eq!(q.to("mmol/L").unwrap(), 1000.0, epsilon = 1e-9);

        let molar = Quantity::parse("25 mM").unwrap();
        assert_relative_eq!(molar.to("mmol/L").unwrap(), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_canonical_round_trip_is_exact() {
        for (value, unit) in [(0.19, "mmol/L"), (0.25e-9, "mmol/L/hr"), (1e-3, "1/(hr*(mmol/L)^.2)")] {
            let q = Quantity::parse(&format!("{} {}", value, unit)).unwrap();
            assert_eq!(q.to(unit).unwrap(), value);
        }
    }

    #[test]
    fn test_fractional_exponent() {
        let q = Quantity::parse("1e-3 1/(hr*(mmol/L)^.2)").unwrap();
        let dims = q.dimensions();
        assert_relative_eq!(dims[2], -1.0);
        assert_relative_eq!(dims[3], -0.2);
        assert_relative_eq!(dims[0], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_pow_double_star() {
        let a = Quantity::parse("2 m**3").unwrap();
        assert_relative_eq!(a.to("L").unwrap(), 2000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_incompatible_dimensions() {
        let volume = Quantity::parse("2 L").unwrap();
        let err = volume.to("1/hr").unwrap_err();
        assert!(matches!(err, SimulationError::Dimensionality { .. }));
    }

    #[test]
    fn test_counts_are_dimensionless() {
        let density = Quantity::parse("8e9 cells/L").unwrap();
        assert_relative_eq!(density.to("1/L").unwrap(), 8e9, epsilon = 1.0);
        let ml = Quantity::parse("8 1/mL").unwrap();
        assert_relative_eq!(ml.to("1/L").unwrap(), 8000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_offset_temperature() {
        let celsius = Quantity::parse("36.4 degC").unwrap();
        assert_relative_eq!(celsius.to("degC").unwrap(), 36.4, epsilon = 1e-12);
        assert_relative_eq!(celsius.to("K").unwrap(), 309.55, epsilon = 1e-9);

        let fahrenheit = Quantity::parse("98.6 degF").unwrap();
        assert_relative_eq!(fahrenheit.to("degC").unwrap(), 37.0, epsilon = 1e-9);
    }

    #[test]
    fn test_offset_temperature_in_compound_rejected() {
        assert!(Quantity::parse("1 degC/hr").is_err());
    }

    #[test]
    fn test_unknown_unit() {
        let err = Quantity::parse("3 furlongs").unwrap_err();
        assert!(matches!(err, SimulationError::UnitParse { .. }));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(Quantity::parse("").is_err());
        assert!(Quantity::parse("(mmol/L").is_err());
        assert!(Quantity::parse("mmol ^ L").is_err());
        assert!(Quantity::parse("5 $").is_err());
    }
}
