//! Demo procedures served by the binary.

use postwire::Server;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DemoError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("quotient overflows int64")]
    Overflow,

    #[error("no values to summarize")]
    EmptyInput,
}

pub fn register(server: &mut Server) {
    server
        .register("Add", add)
        .register("Div", div)
        .register("Echo", echo)
        .register("Stats", stats);
}

fn add(a: i64, b: i64) -> i64 {
    a.wrapping_add(b)
}

fn div(a: i64, b: i64) -> Result<i64, DemoError> {
    if b == 0 {
        return Err(DemoError::DivisionByZero);
    }
    a.checked_div(b).ok_or(DemoError::Overflow)
}

fn echo(text: String) -> String {
    text
}

/// Mean and maximum of `values`.
fn stats(values: Vec<f64>) -> Result<(f64, f64), DemoError> {
    if values.is_empty() {
        return Err(DemoError::EmptyInput);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((mean, max))
}
