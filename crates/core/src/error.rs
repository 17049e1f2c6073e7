use std::collections::BTreeSet;

use thiserror::Error;

use a65_isa6502::UnknownOpcode;

/// Per-statement assembly failures. The pass loops convert these into
/// error diagnostics on the statement's line and keep going; nothing here
/// unwinds past a single statement.
#[derive(Debug, Error)]
pub enum AsmError {
    #[error(transparent)]
    UnknownOpcode(#[from] UnknownOpcode),

    #[error("symbols {} are undefined in operand", quote_names(.0))]
    UndefinedSymbols(BTreeSet<String>),

    #[error("org expression must be fully defined in pass 1; symbols {} are undefined", quote_names(.0))]
    OrgUndefined(BTreeSet<String>),

    #[error("org expression has a different value in pass 2")]
    OrgChanged,

    #[error("space count must be fully defined in pass 1; symbols {} are undefined", quote_names(.0))]
    SpaceUndefined(BTreeSet<String>),

    #[error("space count {count} is negative")]
    SpaceCountNegative { count: i64 },

    #[error("rep count must be fully defined in pass 1; symbols {} are undefined", quote_names(.0))]
    RepCountUndefined(BTreeSet<String>),

    #[error("rep count {count} must be at least 1")]
    RepCountNonPositive { count: i64 },

    #[error("cannot redefine symbol '{name}'")]
    SymbolRedefinition { name: String },

    #[error("divide by zero")]
    DivideByZero,

    #[error("opcode '{mnemonic}' has no {mode} mode")]
    NoSuchAddressingMode {
        mnemonic: String,
        mode: &'static str,
    },

    #[error("relative branch offset {delta} is out of range")]
    RelativeBranchOutOfRange { delta: i64 },

    #[error("address ${value:04X} is not in zero page")]
    AddressNotZeroPage { value: i64 },

    #[error("opcode '{mnemonic}' has no {mode} mode and the address is not in zero page")]
    NoAbsoluteIndexedMode {
        mnemonic: String,
        mode: &'static str,
    },

    #[error("attempt to store data outside the addressing range $0000-$FFFF")]
    AddressOverflow,

    #[error("location counter value {value} is outside $0000-$10000")]
    LocOutOfRange { value: i64 },
}

fn quote_names(names: &BTreeSet<String>) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
