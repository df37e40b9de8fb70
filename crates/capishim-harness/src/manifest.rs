//! Machine-readable listing of the exported symbol table.

use capishim_abi::{Symbol, VARIADIC_PAIRS};
use capishim_core::Contract;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub name: String,
    /// `returns` or `noreturn`.
    pub contract: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariadicEntry {
    pub public: String,
    pub va_list: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolManifest {
    pub manifest_version: u32,
    pub symbol_count: usize,
    pub symbols: Vec<ManifestEntry>,
    /// Exported only with the ABI crate's `c-variadic` feature.
    pub variadic: Vec<VariadicEntry>,
}

impl SymbolManifest {
    /// Build the manifest from the compiled symbol table.
    #[must_use]
    pub fn current() -> Self {
        let symbols: Vec<ManifestEntry> = Symbol::ALL
            .iter()
            .enumerate()
            .map(|(index, symbol)| ManifestEntry {
                index,
                name: symbol.name().to_string(),
                contract: match symbol.decl().contract {
                    Contract::Returns => "returns",
                    Contract::NoReturn => "noreturn",
                    Contract::Unimplemented => "unimplemented",
                }
                .to_string(),
                signature: symbol.signature().to_string(),
            })
            .collect();
        let variadic = VARIADIC_PAIRS
            .iter()
            .map(|(public, va_list)| VariadicEntry {
                public: (*public).to_string(),
                va_list: (*va_list).to_string(),
            })
            .collect();

        Self {
            manifest_version: 1,
            symbol_count: symbols.len(),
            symbols,
            variadic,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.symbols.iter().find(|entry| entry.name == name)
    }
}
