use indexmap::IndexMap;

use crate::error::AsmError;

/// Value cell for one symbol. The placeholder value of an undefined
/// symbol is 1 so that arithmetic on a partially defined expression never
/// divides by zero; callers must check `defined` before trusting `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub defined: bool,
    pub value: i64,
}

impl Default for Symbol {
    fn default() -> Self {
        Self {
            defined: false,
            value: 1,
        }
    }
}

/// Case-insensitive symbol table. Names are upper-cased on insert and
/// lookup; iteration preserves definition order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Symbol {
        self.symbols
            .get(&name.to_ascii_uppercase())
            .copied()
            .unwrap_or_default()
    }

    /// Upsert. Redefining a symbol to a different value is an error; the
    /// same value is accepted so pass 2 can re-run every `SET`.
    pub fn set_value(&mut self, name: &str, value: i64) -> Result<(), AsmError> {
        let upper = name.to_ascii_uppercase();
        let entry = self.symbols.entry(upper).or_default();
        if entry.defined && entry.value != value {
            return Err(AsmError::SymbolRedefinition {
                name: name.to_ascii_uppercase(),
            });
        }
        entry.defined = true;
        entry.value = value;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Symbol)> {
        self.symbols
            .iter()
            .map(|(name, symbol)| (name.as_str(), *symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut table = SymbolTable::new();
        table.set_value("start", 0x1000).expect("set");
        assert_eq!(table.lookup("START").value, 0x1000);
        assert_eq!(table.lookup("Start").value, 0x1000);
    }

    #[test]
    fn missing_symbol_returns_undefined_placeholder() {
        let table = SymbolTable::new();
        let symbol = table.lookup("NOWHERE");
        assert!(!symbol.defined);
        assert_eq!(symbol.value, 1);
    }

    #[test]
    fn redefinition_to_same_value_is_allowed() {
        let mut table = SymbolTable::new();
        table.set_value("TOP", 5).expect("set");
        table.set_value("top", 5).expect("re-set");
        assert_eq!(table.lookup("TOP").value, 5);
    }

    #[test]
    fn redefinition_to_different_value_fails() {
        let mut table = SymbolTable::new();
        table.set_value("TOP", 5).expect("set");
        let err = table.set_value("TOP", 6).expect_err("must fail");
        assert!(matches!(
            err,
            AsmError::SymbolRedefinition { name } if name == "TOP"
        ));
    }

    #[test]
    fn clear_empties_the_table() {
        let mut table = SymbolTable::new();
        table.set_value("A", 1).expect("set");
        table.clear();
        assert!(table.is_empty());
        assert!(!table.lookup("A").defined);
    }
}
