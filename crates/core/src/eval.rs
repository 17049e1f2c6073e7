use std::collections::BTreeSet;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::AsmError;
use crate::symtab::SymbolTable;

/// Outcome of evaluating an expression tree. An expression mentioning any
/// undefined symbol is `Undefined` and carries every missing name, so one
/// diagnostic can report them all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprResult {
    Defined(i64),
    Undefined(BTreeSet<String>),
}

impl ExprResult {
    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }
}

/// Evaluate in a context of a symbol table and the current location
/// counter. Definedness is checked before any operator is applied, so
/// arithmetic on an undefined subtree cannot fault; only a defined zero
/// divisor raises `DivideByZero`.
pub fn eval(expr: &Expr, symtab: &SymbolTable, loc: u32) -> Result<ExprResult, AsmError> {
    match expr {
        Expr::Constant(value, _) => Ok(ExprResult::Defined(*value)),
        Expr::Symbol(name) => {
            let symbol = symtab.lookup(name);
            if symbol.defined {
                Ok(ExprResult::Defined(symbol.value))
            } else {
                let mut names = BTreeSet::new();
                names.insert(name.to_ascii_uppercase());
                Ok(ExprResult::Undefined(names))
            }
        }
        Expr::Location => Ok(ExprResult::Defined(i64::from(loc))),
        Expr::Unary { op, expr } => {
            let operand = eval(expr, symtab, loc)?;
            let ExprResult::Defined(value) = operand else {
                return Ok(operand);
            };
            Ok(ExprResult::Defined(match op {
                UnaryOp::Neg => value.wrapping_neg(),
                UnaryOp::BitNot => !value,
            }))
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, symtab, loc)?;
            let rhs = eval(rhs, symtab, loc)?;
            apply_binary(*op, lhs, rhs)
        }
        Expr::Group(inner) => eval(inner, symtab, loc),
    }
}

/// Evaluation wrapper for contexts where every symbol must already be
/// defined (all of pass 2, and pass-1 `ORG`/space counts via their own
/// error mapping).
pub fn eval_defined(expr: &Expr, symtab: &SymbolTable, loc: u32) -> Result<i64, AsmError> {
    match eval(expr, symtab, loc)? {
        ExprResult::Defined(value) => Ok(value),
        ExprResult::Undefined(symbols) => Err(AsmError::UndefinedSymbols(symbols)),
    }
}

fn apply_binary(op: BinaryOp, lhs: ExprResult, rhs: ExprResult) -> Result<ExprResult, AsmError> {
    let (lhs, rhs) = match (lhs, rhs) {
        (ExprResult::Defined(lhs), ExprResult::Defined(rhs)) => (lhs, rhs),
        (lhs, rhs) => {
            let mut names = BTreeSet::new();
            if let ExprResult::Undefined(undefined) = lhs {
                names.extend(undefined);
            }
            if let ExprResult::Undefined(undefined) = rhs {
                names.extend(undefined);
            }
            return Ok(ExprResult::Undefined(names));
        }
    };

    let value = match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div => {
            if rhs == 0 {
                return Err(AsmError::DivideByZero);
            }
            lhs.wrapping_div(rhs)
        }
        BinaryOp::Mod => {
            if rhs == 0 {
                return Err(AsmError::DivideByZero);
            }
            lhs.wrapping_rem(rhs)
        }
        BinaryOp::Shl => shift(lhs, rhs, i64::checked_shl),
        BinaryOp::Shr => shift(lhs, rhs, i64::checked_shr),
        BinaryOp::And => lhs & rhs,
        BinaryOp::Or => lhs | rhs,
        BinaryOp::Xor => lhs ^ rhs,
    };
    Ok(ExprResult::Defined(value))
}

fn shift(lhs: i64, rhs: i64, apply: fn(i64, u32) -> Option<i64>) -> i64 {
    u32::try_from(rhs)
        .ok()
        .and_then(|count| apply(lhs, count))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NumFmt;

    fn constant(value: i64) -> Expr {
        Expr::Constant(value, NumFmt::Dec)
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn eval_value(expr: &Expr, symtab: &SymbolTable) -> i64 {
        match eval(expr, symtab, 0).expect("eval") {
            ExprResult::Defined(value) => value,
            ExprResult::Undefined(symbols) => panic!("unexpected undefined: {symbols:?}"),
        }
    }

    #[test]
    fn evaluates_constants_and_operators() {
        let symtab = SymbolTable::new();
        let expr = binary(
            BinaryOp::Or,
            binary(BinaryOp::Shl, constant(1), constant(4)),
            constant(3),
        );
        assert_eq!(eval_value(&expr, &symtab), 19);
        let expr = binary(BinaryOp::Mod, constant(7), constant(3));
        assert_eq!(eval_value(&expr, &symtab), 1);
    }

    #[test]
    fn unary_operators_negate_and_invert() {
        let symtab = SymbolTable::new();
        let neg = Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(constant(3)),
        };
        assert_eq!(eval_value(&neg, &symtab), -3);
        let not = Expr::Unary {
            op: UnaryOp::BitNot,
            expr: Box::new(constant(0)),
        };
        assert_eq!(eval_value(&not, &symtab), -1);
    }

    #[test]
    fn location_token_reads_the_location_counter() {
        let symtab = SymbolTable::new();
        let result = eval(&Expr::Location, &symtab, 0x1234).expect("eval");
        assert_eq!(result, ExprResult::Defined(0x1234));
    }

    #[test]
    fn defined_symbols_resolve_case_insensitively() {
        let mut symtab = SymbolTable::new();
        symtab.set_value("TOP", 0x3000).expect("set");
        let expr = Expr::Symbol("top".to_string());
        assert_eq!(eval_value(&expr, &symtab), 0x3000);
    }

    #[test]
    fn undefined_symbols_union_across_the_tree() {
        let symtab = SymbolTable::new();
        let expr = binary(
            BinaryOp::Add,
            Expr::Symbol("foo".to_string()),
            Expr::Symbol("bar".to_string()),
        );
        let ExprResult::Undefined(symbols) = eval(&expr, &symtab, 0).expect("eval") else {
            panic!("expected undefined");
        };
        let names: Vec<&str> = symbols.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["BAR", "FOO"]);
    }

    #[test]
    fn division_by_an_undefined_symbol_stays_undefined() {
        let symtab = SymbolTable::new();
        let expr = binary(BinaryOp::Div, constant(10), Expr::Symbol("n".to_string()));
        let result = eval(&expr, &symtab, 0).expect("eval must not fault");
        assert!(!result.is_defined());
    }

    #[test]
    fn division_by_defined_zero_fails() {
        let symtab = SymbolTable::new();
        let expr = binary(BinaryOp::Div, constant(10), constant(0));
        let err = eval(&expr, &symtab, 0).expect_err("must fail");
        assert!(matches!(err, AsmError::DivideByZero));
        let expr = binary(BinaryOp::Mod, constant(10), constant(0));
        assert!(matches!(
            eval(&expr, &symtab, 0).expect_err("must fail"),
            AsmError::DivideByZero
        ));
    }

    #[test]
    fn group_is_transparent_to_evaluation() {
        let symtab = SymbolTable::new();
        let expr = Expr::Group(Box::new(binary(BinaryOp::Mul, constant(6), constant(7))));
        assert_eq!(eval_value(&expr, &symtab), 42);
    }

    #[test]
    fn eval_defined_reports_missing_symbols() {
        let symtab = SymbolTable::new();
        let err = eval_defined(&Expr::Symbol("gone".to_string()), &symtab, 0)
            .expect_err("must fail");
        assert!(matches!(err, AsmError::UndefinedSymbols(_)));
    }

    #[test]
    fn oversized_shift_counts_collapse_to_zero() {
        let symtab = SymbolTable::new();
        let expr = binary(BinaryOp::Shl, constant(1), constant(400));
        assert_eq!(eval_value(&expr, &symtab), 0);
        let expr = binary(BinaryOp::Shr, constant(1), constant(-1));
        assert_eq!(eval_value(&expr, &symtab), 0);
    }
}
